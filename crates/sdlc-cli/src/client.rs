use std::path::{Path, PathBuf};

use sdlc_wire::{read_value, write_value, EnqueueRequest, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to sdlcd at {path}: {source}")]
    Connect { path: PathBuf, source: std::io::Error },

    #[error("lost connection to sdlcd: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Daemon(String),

    #[error("sdlcd sent an unexpected response")]
    UnexpectedResponse,
}

/// Thin client over the supervisor's Unix domain socket. One connection per
/// request/response round trip, mirroring how short-lived CLI invocations
/// use the daemon: connect, send one request, read one response, disconnect.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect { path: socket_path.to_path_buf(), source })?;
        Ok(Self { stream })
    }

    async fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
        write_value(&mut self.stream, request).await?;
        let response: Response = read_value(&mut self.stream).await?;
        if let Response::Error { message } = response {
            return Err(ClientError::Daemon(message));
        }
        Ok(response)
    }

    pub async fn enqueue(&mut self, request: EnqueueRequest) -> Result<EnqueuedSession, ClientError> {
        match self.send(&Request::Enqueue { request }).await? {
            Response::Enqueued { session_id, status, message, repo_url, branch, sub_path } => {
                Ok(EnqueuedSession { session_id, status, message, repo_url, branch, sub_path })
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn get_status(&mut self, session_id: &str) -> Result<sdlc_wire::SessionDto, ClientError> {
        let request = Request::GetStatus { session_id: session_id.to_string() };
        match self.send(&request).await? {
            Response::Status { session } => Ok(session),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn list_sessions(&mut self, phase: Option<&str>) -> Result<Vec<sdlc_wire::SessionDto>, ClientError> {
        let request = Request::ListSessions { phase: phase.map(str::to_string) };
        match self.send(&request).await? {
            Response::Sessions { sessions } => Ok(sessions),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

pub struct EnqueuedSession {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
}
