use std::path::PathBuf;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};
use crate::{client::DaemonClient, socket_path_or_default};

#[allow(clippy::too_many_arguments)]
pub async fn handle(
    socket: Option<PathBuf>,
    repo_url: String,
    branch: String,
    sub_path: Option<String>,
    fix_instructions: String,
    stack_info: Option<String>,
    format: OutputFormat,
) -> Result<(), ExitError> {
    let stack_info = stack_info
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|err| ExitError::new(2, format!("invalid --stack-info JSON: {err}")))?;

    let socket_path = socket_path_or_default(socket);
    let mut client = DaemonClient::connect(&socket_path).await?;
    let enqueued = client
        .enqueue(sdlc_wire::EnqueueRequest::Fix {
            repo_url: repo_url.clone(),
            branch: branch.clone(),
            sub_path: sub_path.clone(),
            fix_instructions: fix_instructions.clone(),
            stack_info,
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
            println!("Repair enqueued: {}", enqueued.session_id);
            println!("  status: {}", enqueued.status);
        },
    )
    .map_err(ExitError::from)
}
