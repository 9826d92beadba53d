use async_trait::async_trait;
use sdlc_core::SessionId;
use sdlc_storage::Projection;

use crate::error::CoordinatorError;

/// What the Coordinator needs to start a child job (spec.md §4.6 S0/S2/S4).
/// Each call returns the freshly minted child session id immediately; the
/// work itself runs independently of the coordinator's own invocation,
/// matching spec.md §9's re-enqueue-with-delay preference — the
/// coordinator never blocks on a child worker's internals, only on its
/// projected state.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn enqueue_deploy(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId;

    async fn enqueue_verify(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        stack_info: serde_json::Value,
    ) -> SessionId;

    async fn enqueue_repair(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        fix_instructions: &str,
        stack_info: Option<serde_json::Value>,
    ) -> SessionId;
}

/// What an `AwaitX` state polls (spec.md §4.6). `Ok(None)` means the child
/// session has not reported in yet — keep waiting, does not count against
/// the transient-failure budget. `Err` is a failed probe attempt, which
/// does count (spec.md §4.6 "up to 5 consecutive transient failures as
/// not-ready, not terminal").
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn project(&self, session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError>;
}

/// Projects straight through a `SessionStore`, treating "not found yet" as
/// `Ok(None)` rather than a transient failure.
pub struct StoreStatusProbe {
    pub store: std::sync::Arc<sdlc_storage::SessionStore>,
}

#[async_trait]
impl StatusProbe for StoreStatusProbe {
    async fn project(&self, session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
        match self.store.project(session_id) {
            Ok(projection) => Ok(Some(projection)),
            Err(sdlc_storage::StorageError::NotFound { .. }) => Ok(None),
            Err(other) => Err(CoordinatorError::Storage(other)),
        }
    }
}
