use std::sync::Arc;

use sdlc_adapters::DelayQueue;
use sdlc_coordinator::SdlcRequest;
use sdlc_core::{Clock, Config, Event, EventKind, SessionId, SessionKind, SystemClock};
use sdlc_deploy::DeployRequest;
use sdlc_repair::RepairRequest;
use sdlc_storage::{ArtifactStore, Projection, SessionStore, StorageError};
use sdlc_verify::VerifyRequest;
use tracing::error;

/// The four re-enqueue-with-delay queues a session can land on (spec.md
/// §9). Kept as one struct so `Supervisor` and `QueueRunner` share the same
/// due-time-ordered storage without either owning the other.
#[derive(Default)]
pub struct Queues {
    pub deploy: DelayQueue<DeployRequest>,
    pub verify: DelayQueue<VerifyRequest>,
    pub repair: DelayQueue<RepairRequest>,
    pub sdlc: DelayQueue<SdlcRequest>,
}

/// Owns the shared session/artifact stores and the job queues every worker
/// pulls from. Enqueue methods mint a session id, record its creation, push
/// the job, and return immediately — the actual work happens later on a
/// `QueueRunner` tick (spec.md §6 "enqueue and immediately return a session
/// id"; spec.md §9 re-enqueue-with-delay).
pub struct Supervisor {
    pub store: Arc<SessionStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub queues: Queues,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl Supervisor {
    pub fn new(store: Arc<SessionStore>, artifacts: Arc<ArtifactStore>, config: Config) -> Self {
        Self { store, artifacts, queues: Queues::default(), config, clock: Arc::new(SystemClock) }
    }

    pub fn enqueue_deploy(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId {
        let session_id = SessionId::new(SessionKind::Deploy);
        self.record_created(&session_id, repo_url, branch, sub_path);
        self.queues.deploy.push_now(DeployRequest {
            session_id: session_id.clone(),
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
            sub_path: sub_path.map(str::to_string),
        });
        session_id
    }

    pub fn enqueue_verify(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        stack_info: serde_json::Value,
    ) -> SessionId {
        let session_id = SessionId::new(SessionKind::Verify);
        self.record_created(&session_id, repo_url, branch, sub_path);
        self.queues.verify.push_now(VerifyRequest {
            session_id: session_id.clone(),
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
            sub_path: sub_path.map(str::to_string),
            stack_info,
        });
        session_id
    }

    pub fn enqueue_repair(
        &self,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        fix_instructions: &str,
        stack_info: Option<serde_json::Value>,
    ) -> SessionId {
        let session_id = SessionId::new(SessionKind::Repair);
        self.record_created(&session_id, repo_url, branch, sub_path);
        self.queues.repair.push_now(RepairRequest {
            session_id: session_id.clone(),
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
            sub_path: sub_path.map(str::to_string),
            fix_instructions: fix_instructions.to_string(),
            stack_info,
        });
        session_id
    }

    pub fn enqueue_sdlc(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId {
        let session_id = SessionId::new(SessionKind::Sdlc);
        self.record_created(&session_id, repo_url, branch, sub_path);
        self.queues.sdlc.push_now(SdlcRequest {
            session_id: session_id.clone(),
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
            sub_path: sub_path.map(str::to_string),
        });
        session_id
    }

    pub fn project(&self, session_id: &SessionId) -> Result<Projection, StorageError> {
        self.store.project(session_id)
    }

    /// Lists sessions, filtered to `phase` when given, most-recently-updated
    /// first (spec.md §6).
    pub fn list_sessions(&self, phase: Option<&str>) -> Vec<Projection> {
        match phase {
            Some(phase) => self.store.list_by_phase(phase),
            None => self.store.list_all(),
        }
    }

    fn record_created(&self, session_id: &SessionId, repo_url: &str, branch: &str, sub_path: Option<&str>) {
        let event = Event::new(
            session_id.clone(),
            self.clock.now_ms(),
            EventKind::SessionCreated {
                repo_url: repo_url.to_string(),
                branch: branch.to_string(),
                sub_path: sub_path.map(str::to_string),
            },
        );
        if let Err(err) = self.store.append(event) {
            error!(%err, "failed to record session creation");
        }
    }
}
