use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use sdlc_core::SessionId;
use sdlc_wire::{read_value, write_value, EnqueueRequest, ProtocolError, Request, Response, SessionDto};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::supervisor::Supervisor;

/// Accepts connections on `socket_path` until `cancel` fires. Each
/// connection is handled on its own task and can carry any number of
/// request/response round trips (spec.md §6's HTTP surface, reached over a
/// local Unix domain socket instead of a network listener per spec.md §1).
pub async fn serve(socket_path: &Path, supervisor: Arc<Supervisor>, cancel: CancellationToken) -> std::io::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "listening on unix socket");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let supervisor = supervisor.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, supervisor).await {
                        warn!(%err, "connection ended with an error");
                    }
                });
            }
            _ = cancel.cancelled() => {
                info!("socket listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, supervisor: Arc<Supervisor>) -> Result<(), ProtocolError> {
    loop {
        let request: Request = match read_value(&mut stream).await {
            Ok(request) => request,
            Err(ProtocolError::Io(err)) if err.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };
        let response = handle_request(&supervisor, request);
        write_value(&mut stream, &response).await?;
    }
}

fn handle_request(supervisor: &Supervisor, request: Request) -> Response {
    match request {
        Request::Enqueue { request } => handle_enqueue(supervisor, request),
        Request::GetStatus { session_id } => handle_get_status(supervisor, &session_id),
        Request::ListSessions { phase } => Response::Sessions {
            sessions: supervisor.list_sessions(phase.as_deref()).iter().map(SessionDto::from).collect(),
        },
    }
}

fn handle_enqueue(supervisor: &Supervisor, request: EnqueueRequest) -> Response {
    match request {
        EnqueueRequest::Deploy { repo_url, branch, sub_path } => {
            let session_id = supervisor.enqueue_deploy(&repo_url, &branch, sub_path.as_deref());
            enqueued(session_id, repo_url, branch, sub_path, "deployment enqueued")
        }
        EnqueueRequest::SanityTest { repo_url, branch, sub_path, stack_info } => {
            let session_id = supervisor.enqueue_verify(&repo_url, &branch, sub_path.as_deref(), stack_info);
            enqueued(session_id, repo_url, branch, sub_path, "verification enqueued")
        }
        EnqueueRequest::Fix { repo_url, branch, sub_path, fix_instructions, stack_info } => {
            let session_id =
                supervisor.enqueue_repair(&repo_url, &branch, sub_path.as_deref(), &fix_instructions, stack_info);
            enqueued(session_id, repo_url, branch, sub_path, "repair enqueued")
        }
        EnqueueRequest::SdlcDeploy { repo_url, branch, sub_path } => {
            let session_id = supervisor.enqueue_sdlc(&repo_url, &branch, sub_path.as_deref());
            enqueued(session_id, repo_url, branch, sub_path, "sdlc run enqueued")
        }
    }
}

fn enqueued(session_id: SessionId, repo_url: String, branch: String, sub_path: Option<String>, message: &str) -> Response {
    Response::Enqueued {
        session_id: session_id.to_string(),
        status: "pending".to_string(),
        message: message.to_string(),
        repo_url,
        branch,
        sub_path,
    }
}

fn handle_get_status(supervisor: &Supervisor, session_id: &str) -> Response {
    let session_id: SessionId = match session_id.parse() {
        Ok(id) => id,
        Err(err) => return Response::Error { message: err.to_string() },
    };
    match supervisor.project(&session_id) {
        Ok(projection) => Response::Status { session: SessionDto::from(&projection) },
        Err(sdlc_storage::StorageError::NotFound { session_id }) => {
            Response::Error { message: format!("unknown session: {session_id}") }
        }
        Err(err) => Response::Error { message: err.to_string() },
    }
}
