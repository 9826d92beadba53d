#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Repair Worker (spec.md §4.5): clone, ask the language model for a fix
//! plan, ask it again to rewrite the named files, then publish a branch.
//! Phases: `cloning -> planning -> rewriting -> branching -> pushing ->
//! terminal`.

pub mod error;
pub mod plan;
pub mod rewrite;

use std::sync::Arc;

use sdlc_adapters::{complete_json_with_retry, AiAdapter, Committer, GitAdapter};
use sdlc_core::{Clock, Event, EventKind, SessionId, SystemClock, Terminal};
use sdlc_storage::SessionStore;
use tracing::{error, info, info_span, Instrument};

pub use error::RepairError;

#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub session_id: SessionId,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
    pub fix_instructions: String,
    pub stack_info: Option<serde_json::Value>,
}

pub struct RepairWorker {
    pub store: Arc<SessionStore>,
    pub git: Arc<dyn GitAdapter>,
    pub ai: Arc<dyn AiAdapter>,
    pub clock: Arc<dyn Clock>,
    pub model_id: String,
    pub committer: Committer,
}

impl RepairWorker {
    pub fn new(store: Arc<SessionStore>, git: Arc<dyn GitAdapter>, ai: Arc<dyn AiAdapter>) -> Self {
        Self {
            store,
            git,
            ai,
            clock: Arc::new(SystemClock),
            model_id: sdlc_core::Config::default().ai_model_id,
            committer: Committer::default(),
        }
    }

    /// Runs one repair job end to end. Always ends the session in a
    /// terminal phase (spec.md §8 property 2); errors are caught by the
    /// single top-level handler and turned into a terminal event
    /// (spec.md §9).
    pub async fn run(&self, request: RepairRequest) -> Terminal {
        let span = info_span!("session", id = %request.session_id);
        async {
            self.append(&request.session_id, EventKind::SessionCreated {
                repo_url: request.repo_url.clone(),
                branch: request.branch.clone(),
                sub_path: request.sub_path.clone(),
            });
            match self.run_inner(&request).await {
                Ok(branch_name) => {
                    self.append(&request.session_id, EventKind::RepairBranchPublished { branch_name });
                    info!("repair succeeded");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome: Terminal::Success,
                        message: "repair succeeded".to_string(),
                        error: None,
                    });
                    Terminal::Success
                }
                Err(err) => {
                    let (message, detail) = err.terminal();
                    error!(error = %detail, "repair failed");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome: Terminal::Failed,
                        message,
                        error: Some(detail),
                    });
                    Terminal::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self, request: &RepairRequest) -> Result<String, RepairError> {
        self.set_phase(&request.session_id, "cloning");
        let clone_dir = tempfile::tempdir()?;
        self.git.shallow_clone(&request.repo_url, &request.branch, clone_dir.path()).await?;

        let root = match &request.sub_path {
            Some(sub_path) => clone_dir.path().join(sub_path),
            None => clone_dir.path().to_path_buf(),
        };

        self.set_phase(&request.session_id, "planning");
        let files = plan::list_files(&root)?;
        let plan_prompt = plan::render_plan_prompt(&request.fix_instructions, &files, request.stack_info.as_ref());
        let fix_plan = complete_json_with_retry(self.ai.as_ref(), &self.model_id, &plan_prompt, plan::validate_plan_reply)
            .await
            .map_err(|e| match e {
                sdlc_adapters::AdaptersError::Permanent { message, .. } => RepairError::PlanShapeMismatch(message),
                other => RepairError::Adapter(other),
            })?;
        self.append(&request.session_id, EventKind::RepairPlanProduced {
            summary: fix_plan.summary.clone(),
            steps: fix_plan.steps.clone(),
            files_to_modify: fix_plan.files_to_modify.clone(),
        });

        self.set_phase(&request.session_id, "rewriting");
        let current_contents = rewrite::read_target_files(&root, &fix_plan)?;
        let rewrite_prompt = rewrite::render_rewrite_prompt(&fix_plan, &current_contents);
        let rewritten = complete_json_with_retry(self.ai.as_ref(), &self.model_id, &rewrite_prompt, rewrite::validate_rewrite_reply)
            .await
            .map_err(|e| match e {
                sdlc_adapters::AdaptersError::Permanent { message, .. } => RepairError::RewriteShapeMismatch(message),
                other => RepairError::Adapter(other),
            })?;
        rewrite::write_files(&root, &rewritten)?;

        self.set_phase(&request.session_id, "branching");
        let branch_name = format!("fix/{}", request.session_id);
        let commit_message = format!(
            "{}\n\nsession: {}\ninstructions: {}",
            fix_plan.summary, request.session_id, request.fix_instructions
        );

        self.set_phase(&request.session_id, "pushing");
        self.git
            .publish_branch(clone_dir.path(), &branch_name, &commit_message, &self.committer)
            .await
            .map_err(|e| match e {
                sdlc_adapters::AdaptersError::Permanent { message, .. } if message.contains("push denied") => {
                    RepairError::PushDenied(message)
                }
                other => RepairError::Adapter(other),
            })?;

        Ok(branch_name)
    }

    fn set_phase(&self, session_id: &SessionId, phase: &str) {
        info!(phase, "repair phase");
        self.append(session_id, EventKind::PhaseChanged { phase: phase.to_string() });
    }

    fn append(&self, session_id: &SessionId, kind: EventKind) {
        let timestamp_ms = self.clock.now_ms();
        if let Err(err) = self.store.append(Event::new(session_id.clone(), timestamp_ms, kind)) {
            error!(%err, "failed to append session event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sdlc_adapters::{FakeAiAdapter, FakeGitAdapter};
    use sdlc_core::SessionKind;

    use super::*;

    fn worker(ai: FakeAiAdapter, git: FakeGitAdapter) -> (RepairWorker, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::in_memory());
        let worker = RepairWorker {
            store: store.clone(),
            git: Arc::new(git),
            ai: Arc::new(ai),
            clock: Arc::new(SystemClock),
            model_id: "test-model".to_string(),
            committer: Committer::default(),
        };
        (worker, store)
    }

    fn request() -> RepairRequest {
        RepairRequest {
            session_id: SessionId::new(SessionKind::Repair),
            repo_url: "https://example.com/repo.git".to_string(),
            branch: "main".to_string(),
            sub_path: None,
            fix_instructions: "handler returns 500 on valid input".to_string(),
            stack_info: None,
        }
    }

    #[tokio::test]
    async fn full_happy_path_publishes_branch() {
        let mut fixture = BTreeMap::new();
        fixture.insert("index.js".into(), "exports.handler = () => { throw new Error() }".to_string());
        let plan_reply = serde_json::json!({
            "summary": "fix crash",
            "steps": ["remove throw"],
            "filesToModify": ["index.js"],
        })
        .to_string();
        let rewrite_reply = serde_json::json!({
            "files": {"index.js": "exports.handler = () => ({statusCode: 200})"},
        })
        .to_string();
        let ai = FakeAiAdapter::new(vec![plan_reply, rewrite_reply]);
        let git = FakeGitAdapter::new(fixture);
        let (worker, store) = worker(ai, git);

        let req = request();
        let session_id = req.session_id.clone();
        let expected_branch = format!("fix/{session_id}");
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Success);

        let projection = store.project(&session_id).unwrap();
        assert_eq!(projection.repair.branch_name.as_deref(), Some(expected_branch.as_str()));
        assert_eq!(projection.repair.files_to_modify, vec!["index.js".to_string()]);
    }

    #[tokio::test]
    async fn push_denied_is_terminal_failure() {
        let mut fixture = BTreeMap::new();
        fixture.insert("index.js".into(), "exports.handler = () => { throw new Error() }".to_string());
        let plan_reply = serde_json::json!({
            "summary": "fix crash",
            "steps": ["remove throw"],
            "filesToModify": ["index.js"],
        })
        .to_string();
        let rewrite_reply = serde_json::json!({"files": {"index.js": "ok"}}).to_string();
        let ai = FakeAiAdapter::new(vec![plan_reply, rewrite_reply]);
        let git = FakeGitAdapter::new(fixture).failing_push();
        let (worker, store) = worker(ai, git);

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);

        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("push denied"));
    }
}
