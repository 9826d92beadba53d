use std::sync::Arc;

use async_trait::async_trait;
use sdlc_coordinator::Dispatcher;
use sdlc_core::SessionId;

use crate::supervisor::Supervisor;

/// Wires the coordinator's `Dispatcher` seam to the supervisor's own
/// queues, so an `sdlc-*` session's S0/S2/S4 transitions enqueue exactly
/// the way a CLI-originated `/deploy`, `/sanity-test`, or `/fix` call would
/// (spec.md §4.6).
pub struct SupervisorDispatcher {
    pub supervisor: Arc<Supervisor>,
}

#[async_trait]
impl Dispatcher for SupervisorDispatcher {
    async fn enqueue_deploy(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId {
        self.supervisor.enqueue_deploy(repo_url, branch, sub_path)
    }

    async fn enqueue_verify(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        stack_info: serde_json::Value,
    ) -> SessionId {
        self.supervisor.enqueue_verify(repo_url, branch, sub_path, stack_info)
    }

    async fn enqueue_repair(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        fix_instructions: &str,
        stack_info: Option<serde_json::Value>,
    ) -> SessionId {
        self.supervisor.enqueue_repair(repo_url, branch, sub_path, fix_instructions, stack_info)
    }
}

#[cfg(test)]
mod tests {
    use sdlc_core::{Config, SessionKind};
    use sdlc_storage::{ArtifactStore, SessionStore};
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn enqueue_deploy_delegates_to_the_supervisor() {
        let store = Arc::new(SessionStore::in_memory());
        let dir = tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let supervisor = Arc::new(Supervisor::new(store, artifacts, Config::default()));
        let dispatcher = SupervisorDispatcher { supervisor: supervisor.clone() };

        let id = dispatcher.enqueue_deploy("https://example.com/repo.git", "main", None).await;
        assert_eq!(id.kind(), SessionKind::Deploy);
        assert_eq!(supervisor.queues.deploy.len(), 1);
    }
}
