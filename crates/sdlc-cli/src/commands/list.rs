use std::path::PathBuf;

use crate::exit_error::ExitError;
use crate::output::{handle_list, OutputFormat};
use crate::{client::DaemonClient, socket_path_or_default};

pub async fn handle(socket: Option<PathBuf>, phase: Option<String>, format: OutputFormat) -> Result<(), ExitError> {
    let socket_path = socket_path_or_default(socket);
    let mut client = DaemonClient::connect(&socket_path).await?;
    let sessions = client.list_sessions(phase.as_deref()).await?;

    handle_list(format, &sessions, "No sessions found", |sessions| {
        for session in sessions {
            let status = session.status.map(|s| format!("{s:?}")).unwrap_or_else(|| "-".to_string());
            println!("{}  {:<10} {:<10} {}", session.session_id, session.phase, status, session.repo_url);
        }
    })
    .map_err(ExitError::from)
}
