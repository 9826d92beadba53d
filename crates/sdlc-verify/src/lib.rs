#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Verification Worker (spec.md §4.4): clone, scan the source tree, ask the
//! language model to discover the HTTP surface and synthesize a test
//! suite, then execute it. Phases: `cloning -> scanning -> discovering ->
//! generating -> executing -> terminal`.

pub mod discover;
pub mod error;
pub mod execute;
pub mod generate;
pub mod scan;
pub mod substitute;

use std::sync::Arc;

use sdlc_adapters::{complete_json_with_retry, AiAdapter, GitAdapter, HttpProbeAdapter};
use sdlc_core::payload::TestStepStatus;
use sdlc_core::{Clock, Event, EventKind, SessionId, SystemClock, Terminal};
use sdlc_storage::SessionStore;
use tracing::{error, info, info_span, Instrument};

pub use error::VerifyError;

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub session_id: SessionId,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
    pub stack_info: serde_json::Value,
}

pub struct VerificationWorker {
    pub store: Arc<SessionStore>,
    pub git: Arc<dyn GitAdapter>,
    pub ai: Arc<dyn AiAdapter>,
    pub probe: Arc<dyn HttpProbeAdapter>,
    pub clock: Arc<dyn Clock>,
    pub model_id: String,
}

impl VerificationWorker {
    pub fn new(store: Arc<SessionStore>, git: Arc<dyn GitAdapter>, ai: Arc<dyn AiAdapter>, probe: Arc<dyn HttpProbeAdapter>) -> Self {
        Self { store, git, ai, probe, clock: Arc::new(SystemClock), model_id: sdlc_core::Config::default().ai_model_id }
    }

    /// Runs one verify job end to end. Always ends the session in a
    /// terminal phase (spec.md §8 property 2); errors are caught by the
    /// single top-level handler and turned into a terminal event
    /// (spec.md §9).
    pub async fn run(&self, request: VerifyRequest) -> Terminal {
        let span = info_span!("session", id = %request.session_id);
        async {
            self.append(&request.session_id, EventKind::SessionCreated {
                repo_url: request.repo_url.clone(),
                branch: request.branch.clone(),
                sub_path: request.sub_path.clone(),
            });
            match self.run_inner(&request).await {
                Ok(scenarios) => {
                    let any_fail = scenarios.iter().any(|s| s.steps.iter().any(|step| step.status == TestStepStatus::Fail));
                    for scenario in scenarios {
                        self.append(&request.session_id, EventKind::VerifyScenarioResult {
                            name: scenario.name,
                            steps: scenario.steps,
                        });
                    }
                    let outcome = if any_fail { Terminal::Failed } else { Terminal::Success };
                    let message = if any_fail {
                        "one or more verification steps failed".to_string()
                    } else {
                        "verification succeeded".to_string()
                    };
                    info!(outcome = ?outcome, "verification finished");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome,
                        message,
                        error: None,
                    });
                    outcome
                }
                Err(err) => {
                    let (message, detail) = err.terminal();
                    error!(error = %detail, "verification failed");
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

    async fn run_inner(
        &self,
        request: &VerifyRequest,
    ) -> Result<Vec<sdlc_core::payload::VerifyScenarioResult>, VerifyError> {
        // Input-validation failures must fail before any side effect
        // (spec.md §7), so the base-URL check runs before the clone.
        let base_url = discover::extract_base_url(&request.stack_info)?;

        self.set_phase(&request.session_id, "cloning");
        let clone_dir = tempfile::tempdir()?;
        self.git.shallow_clone(&request.repo_url, &request.branch, clone_dir.path()).await?;

        let root = match &request.sub_path {
            Some(sub_path) => clone_dir.path().join(sub_path),
            None => clone_dir.path().to_path_buf(),
        };

        self.set_phase(&request.session_id, "scanning");
        let source_scan = scan::scan(&root)?;
        let scan_block = scan::render_for_prompt(&source_scan);

        self.set_phase(&request.session_id, "discovering");
        let discover_prompt = discover::render_discover_prompt(&scan_block, &request.stack_info);
        let discovered = complete_json_with_retry(self.ai.as_ref(), &self.model_id, &discover_prompt, discover::validate_discover_reply)
            .await
            .map_err(|e| match e {
                sdlc_adapters::AdaptersError::Permanent { message, .. } => VerifyError::MissingJsonObject(message),
                other => VerifyError::Adapter(other),
            })?;

        self.append(&request.session_id, EventKind::VerifyApiDiscovered {
            base_url: Some(base_url.clone()),
            endpoints: discovered.endpoints.iter().cloned().map(Into::into).collect(),
            authentication: discovered.authentication.clone(),
        });

        self.set_phase(&request.session_id, "generating");
        let generate_prompt = generate::render_generate_prompt(&discovered, &scan_block);
        let generated = complete_json_with_retry(self.ai.as_ref(), &self.model_id, &generate_prompt, generate::validate_generate_reply)
            .await
            .map_err(|e| match e {
                sdlc_adapters::AdaptersError::Permanent { message, .. } => VerifyError::ShapeMismatch(message),
                other => VerifyError::Adapter(other),
            })?;

        self.set_phase(&request.session_id, "executing");
        let mut results = Vec::with_capacity(generated.tests.len());
        for scenario in &generated.tests {
            results.push(execute::execute_scenario(self.probe.as_ref(), &base_url, scenario).await);
        }
        Ok(results)
    }

    fn set_phase(&self, session_id: &SessionId, phase: &str) {
        info!(phase, "verify phase");
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

    use sdlc_adapters::{FakeAiAdapter, FakeGitAdapter, FakeHttpProbeAdapter};
    use sdlc_core::SessionKind;

    use super::*;

    fn worker(ai: FakeAiAdapter, probe: FakeHttpProbeAdapter) -> (VerificationWorker, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::in_memory());
        let mut fixture = BTreeMap::new();
        fixture.insert("index.js".to_string(), "exports.handler = async () => ({statusCode: 200})".to_string());
        let worker = VerificationWorker {
            store: store.clone(),
            git: Arc::new(FakeGitAdapter::new(fixture)),
            ai: Arc::new(ai),
            probe: Arc::new(probe),
            clock: Arc::new(SystemClock),
            model_id: "test-model".to_string(),
        };
        (worker, store)
    }

    fn request(stack_info: serde_json::Value) -> VerifyRequest {
        VerifyRequest {
            session_id: SessionId::new(SessionKind::Verify),
            repo_url: "https://example.com/repo.git".to_string(),
            branch: "main".to_string(),
            sub_path: None,
            stack_info,
        }
    }

    #[tokio::test]
    async fn full_happy_path_succeeds() {
        let discover_reply = serde_json::json!({
            "endpoints": [{"method": "POST", "path": "/items", "description": "create"}],
            "baseUrl": null,
            "authentication": null,
        })
        .to_string();
        let generate_reply = serde_json::json!({
            "tests": [{
                "name": "create item",
                "description": "",
                "steps": [{"action": "create", "endpoint": "/items", "method": "POST", "expectedStatus": 201, "storeVariables": {}}],
            }],
        })
        .to_string();
        let ai = FakeAiAdapter::new(vec![discover_reply, generate_reply]);
        let probe = FakeHttpProbeAdapter::new().script("POST", "https://api.example.com/items", 201, "{}");
        let (worker, store) = worker(ai, probe);

        let req = request(serde_json::json!({"apiUrl": "https://api.example.com"}));
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Success);

        let projection = store.project(&session_id).unwrap();
        assert_eq!(projection.terminal, Some(Terminal::Success));
        assert_eq!(projection.verify.scenarios.len(), 1);
    }

    #[tokio::test]
    async fn failing_step_propagates_to_terminal_failure() {
        let discover_reply = serde_json::json!({"endpoints": [], "baseUrl": null, "authentication": null}).to_string();
        let generate_reply = serde_json::json!({
            "tests": [{
                "name": "two steps",
                "description": "",
                "steps": [
                    {"action": "create", "endpoint": "/items", "method": "POST", "expectedStatus": 201, "storeVariables": {}},
                    {"action": "read", "endpoint": "/items/1", "method": "GET", "expectedStatus": 200, "storeVariables": {}},
                ],
            }],
        })
        .to_string();
        let ai = FakeAiAdapter::new(vec![discover_reply, generate_reply]);
        let probe = FakeHttpProbeAdapter::new()
            .script("POST", "https://api.example.com/items", 201, "{}")
            .script("GET", "https://api.example.com/items/1", 404, "not found");
        let (worker, store) = worker(ai, probe);

        let req = request(serde_json::json!({"apiUrl": "https://api.example.com"}));
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);

        let projection = store.project(&session_id).unwrap();
        let scenario = &projection.verify.scenarios[0];
        assert_eq!(scenario.steps[1].status, TestStepStatus::Fail);
    }

    #[tokio::test]
    async fn missing_base_url_fails_before_any_clone_or_ai_call() {
        let store = Arc::new(SessionStore::in_memory());
        let git = Arc::new(FakeGitAdapter::new(BTreeMap::new()));
        // No discover reply queued: if the worker called the AI adapter at
        // all, FakeAiAdapter would panic on an empty queue.
        let ai = Arc::new(FakeAiAdapter::new(vec![]));
        let worker = VerificationWorker {
            store: store.clone(),
            git: git.clone(),
            ai: ai.clone(),
            probe: Arc::new(FakeHttpProbeAdapter::new()),
            clock: Arc::new(SystemClock),
            model_id: "test-model".to_string(),
        };

        let req = request(serde_json::json!({}));
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);

        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("base URL"));
        assert!(git.clones.lock().is_empty());
    }
}
