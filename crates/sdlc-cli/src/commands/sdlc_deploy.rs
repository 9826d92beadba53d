use std::path::PathBuf;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};
use crate::{client::DaemonClient, socket_path_or_default};

pub async fn handle(
    socket: Option<PathBuf>,
    repo_url: String,
    branch: String,
    sub_path: Option<String>,
    format: OutputFormat,
) -> Result<(), ExitError> {
    let socket_path = socket_path_or_default(socket);
    let mut client = DaemonClient::connect(&socket_path).await?;
    let enqueued = client
        .enqueue(sdlc_wire::EnqueueRequest::SdlcDeploy {
            repo_url: repo_url.clone(),
            branch: branch.clone(),
            sub_path: sub_path.clone(),
        })
        .await?;

    format_or_json(
        format,
        &serde_json::json!({
            "sessionId": enqueued.session_id,
            "status": enqueued.status,
            "message": enqueued.message,
        }),
        || {
            println!("SDLC run enqueued: {}", enqueued.session_id);
            println!("  status: {}", enqueued.status);
        },
    )
    .map_err(ExitError::from)
}
