use std::path::PathBuf;

use sdlc_wire::SessionDto;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};
use crate::{client::DaemonClient, socket_path_or_default};

pub async fn handle(socket: Option<PathBuf>, session_id: String, format: OutputFormat) -> Result<(), ExitError> {
    let socket_path = socket_path_or_default(socket);
    let mut client = DaemonClient::connect(&socket_path).await?;
    let session = client.get_status(&session_id).await?;

    format_or_json(format, &session, || print_session(&session)).map_err(ExitError::from)
}

fn print_session(session: &SessionDto) {
    println!("{} ({})", session.session_id, session.kind);
    println!("  phase:   {}", session.phase);
    if let Some(status) = session.status {
        println!("  result:  {status:?}");
    }
    if let Some(message) = &session.message {
        println!("  message: {message}");
    }
    if let Some(error) = &session.error {
        println!("  error:   {error}");
    }
    println!("  updated: {}", session.last_updated);
    if !session.log.is_empty() {
        println!("  log:");
        for line in &session.log {
            println!("    {line}");
        }
    }
}
