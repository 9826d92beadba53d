#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! SDLC Coordinator (spec.md §4.6): threads deployment, verification, and
//! repair through the state machine `S0 Start -> S1 AwaitDeploy -> S2
//! StartVerify -> S3 AwaitVerify -> (S4 StartRepair -> S5 AwaitRepair ->
//! S0)* -> S_ok | S_fail`.

pub mod dispatch;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use sdlc_core::payload::DeployedResource;
use sdlc_core::{Clock, Event, EventKind, SessionId, SystemClock, Terminal, TestStepStatus};
use sdlc_storage::{Projection, SessionStore};
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

pub use dispatch::{Dispatcher, StatusProbe, StoreStatusProbe};
pub use error::CoordinatorError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_WALL_CLOCK: Duration = Duration::from_secs(15 * 60);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TRANSIENT_TOLERANCE: u32 = 5;

#[derive(Debug, Clone)]
pub struct SdlcRequest {
    pub session_id: SessionId,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
}

pub struct CoordinatorWorker {
    pub store: Arc<SessionStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub probe: Arc<dyn StatusProbe>,
    pub clock: Arc<dyn Clock>,
    pub poll_interval: Duration,
    pub wall_clock_budget: Duration,
    pub max_attempts: u32,
    pub transient_failure_tolerance: u32,
}

impl CoordinatorWorker {
    pub fn new(store: Arc<SessionStore>, dispatcher: Arc<dyn Dispatcher>, probe: Arc<dyn StatusProbe>) -> Self {
        Self {
            store,
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wall_clock_budget: DEFAULT_WALL_CLOCK,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            transient_failure_tolerance: DEFAULT_TRANSIENT_TOLERANCE,
        }
    }

    /// Runs one sdlc job end to end. Always ends the session in a terminal
    /// phase (spec.md §8 property 2); errors are caught by the single
    /// top-level handler and turned into a terminal event (spec.md §9).
    pub async fn run(&self, request: SdlcRequest) -> Terminal {
        let span = info_span!("session", id = %request.session_id);
        async {
            self.append(&request.session_id, EventKind::SessionCreated {
                repo_url: request.repo_url.clone(),
                branch: request.branch.clone(),
                sub_path: request.sub_path.clone(),
            });
            match self.run_inner(&request).await {
                Ok(()) => {
                    info!("sdlc run reached S_ok");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome: Terminal::Success,
                        message: "sdlc run succeeded".to_string(),
                        error: None,
                    });
                    Terminal::Success
                }
                Err(err) => {
                    let (message, detail) = err.terminal();
                    error!(error = %detail, "sdlc run reached S_fail");
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

    async fn run_inner(&self, request: &SdlcRequest) -> Result<(), CoordinatorError> {
        let deadline = Instant::now() + self.wall_clock_budget;
        let deadline_ms = self.clock.now_ms() + self.wall_clock_budget.as_millis() as u64;
        self.append(&request.session_id, EventKind::SdlcDeadlineSet { deadline_ms });

        let repo_url = request.repo_url.clone();
        let mut branch = request.branch.clone();
        let sub_path = request.sub_path.clone();
        let mut attempt: u32 = 1;

        loop {
            self.set_phase(&request.session_id, "s0_start");
            self.check_deadline(deadline)?;
            let deploy_id = self.dispatcher.enqueue_deploy(&repo_url, &branch, sub_path.as_deref()).await;
            self.append(&request.session_id, EventKind::SdlcAttemptStarted { attempt, deploy_session_id: deploy_id.clone() });

            self.set_phase(&request.session_id, "s1_await_deploy");
            let deploy_projection = self.await_terminal(&deploy_id, deadline).await?;

            if deploy_projection.terminal != Some(Terminal::Success) {
                let fix_instructions = format!(
                    "deployment failed: {}\n{}",
                    deploy_projection.message.clone().unwrap_or_default(),
                    deploy_projection.log.join("\n")
                );
                let new_branch = self
                    .run_repair(&request.session_id, attempt, &repo_url, &branch, sub_path.as_deref(), fix_instructions, None, deadline)
                    .await?;
                branch = new_branch;
                attempt += 1;
                if attempt > self.max_attempts {
                    return Err(CoordinatorError::AttemptBudgetExceeded(self.max_attempts));
                }
                continue;
            }

            let stack_info = deploy_resources_to_stack_info(&deploy_projection.deploy.deployed_resources);

            self.set_phase(&request.session_id, "s2_start_verify");
            self.check_deadline(deadline)?;
            let verify_id = self.dispatcher.enqueue_verify(&repo_url, &branch, sub_path.as_deref(), stack_info.clone()).await;
            self.append(&request.session_id, EventKind::SdlcVerifyStarted { attempt, verify_session_id: verify_id.clone() });

            self.set_phase(&request.session_id, "s3_await_verify");
            let verify_projection = self.await_terminal(&verify_id, deadline).await?;

            if verify_projection.terminal == Some(Terminal::Success) {
                return Ok(());
            }

            let fix_instructions = derive_verify_fix_instructions(&verify_projection);
            let new_branch = self
                .run_repair(
                    &request.session_id,
                    attempt,
                    &repo_url,
                    &branch,
                    sub_path.as_deref(),
                    fix_instructions,
                    Some(stack_info),
                    deadline,
                )
                .await?;
            branch = new_branch;
            attempt += 1;
            if attempt > self.max_attempts {
                return Err(CoordinatorError::AttemptBudgetExceeded(self.max_attempts));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_repair(
        &self,
        session_id: &SessionId,
        attempt: u32,
        repo_url: &str,
        branch: &str,
        sub_path: Option<&str>,
        fix_instructions: String,
        stack_info: Option<serde_json::Value>,
        deadline: Instant,
    ) -> Result<String, CoordinatorError> {
        self.set_phase(session_id, "s4_start_repair");
        self.check_deadline(deadline)?;
        let repair_id = self.dispatcher.enqueue_repair(repo_url, branch, sub_path, &fix_instructions, stack_info).await;
        self.append(session_id, EventKind::SdlcRepairStarted { attempt, repair_session_id: repair_id.clone() });

        self.set_phase(session_id, "s5_await_repair");
        let repair_projection = self.await_terminal(&repair_id, deadline).await?;
        if repair_projection.terminal != Some(Terminal::Success) {
            return Err(CoordinatorError::Probe(
                repair_projection.error.unwrap_or_else(|| "repair failed".to_string()),
            ));
        }
        repair_projection
            .repair
            .branch_name
            .clone()
            .ok_or_else(|| CoordinatorError::Probe("repair succeeded without a branch name".to_string()))
    }

    /// Guards an `S0`/`S2`/`S4` enqueue against a budget that already
    /// expired while the previous `AwaitX` state was polling: `await_terminal`
    /// only checks the deadline at the top of its own loop, so a child
    /// session reaching terminal within one poll interval of the deadline
    /// must not be followed by a fresh enqueue (spec.md §8 property 6).
    fn check_deadline(&self, deadline: Instant) -> Result<(), CoordinatorError> {
        if Instant::now() >= deadline {
            return Err(CoordinatorError::WallClockExceeded(self.wall_clock_budget));
        }
        Ok(())
    }

    /// Waits on an `AwaitX` state: polls the child session every
    /// `poll_interval`, tolerating up to `transient_failure_tolerance`
    /// consecutive probe failures before giving up (spec.md §4.6).
    async fn await_terminal(&self, session_id: &SessionId, deadline: Instant) -> Result<Projection, CoordinatorError> {
        let mut consecutive_failures = 0u32;
        loop {
            if Instant::now() >= deadline {
                return Err(CoordinatorError::WallClockExceeded(self.wall_clock_budget));
            }
            match self.probe.project(session_id).await {
                Ok(Some(projection)) if projection.terminal.is_some() => return Ok(projection),
                Ok(_) => {
                    consecutive_failures = 0;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(%err, consecutive_failures, "status probe failed");
                    if consecutive_failures > self.transient_failure_tolerance {
                        return Err(CoordinatorError::TooManyTransientFailures(self.transient_failure_tolerance));
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn set_phase(&self, session_id: &SessionId, phase: &str) {
        info!(phase, "sdlc phase");
        self.append(session_id, EventKind::PhaseChanged { phase: phase.to_string() });
    }

    fn append(&self, session_id: &SessionId, kind: EventKind) {
        let timestamp_ms = self.clock.now_ms();
        if let Err(err) = self.store.append(Event::new(session_id.clone(), timestamp_ms, kind)) {
            error!(%err, "failed to append session event");
        }
    }
}

fn deploy_resources_to_stack_info(resources: &std::collections::BTreeMap<String, DeployedResource>) -> serde_json::Value {
    serde_json::Value::Object(resources.iter().map(|(k, v)| (k.clone(), serde_json::Value::String(v.as_str().to_string()))).collect())
}

fn derive_verify_fix_instructions(projection: &Projection) -> String {
    let failing: Vec<&str> = projection
        .verify
        .scenarios
        .iter()
        .filter(|s| s.steps.iter().any(|step| step.status == TestStepStatus::Fail))
        .map(|s| s.name.as_str())
        .collect();
    format!("verification failed for scenarios: {}", failing.join(", "))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sdlc_core::{SessionKind, TestStepResult};

    use super::*;

    struct ScriptedProbe {
        store: Arc<SessionStore>,
    }

    #[async_trait]
    impl StatusProbe for ScriptedProbe {
        async fn project(&self, session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
            match self.store.project(session_id) {
                Ok(p) => Ok(Some(p)),
                Err(sdlc_storage::StorageError::NotFound { .. }) => Ok(None),
                Err(other) => Err(CoordinatorError::Storage(other)),
            }
        }
    }

    /// Deploy outcomes are popped one per `enqueue_deploy` call (front
    /// first), so a test can script "fails once, then succeeds" to exercise
    /// the S4/S5 repair-and-retry loop deterministically.
    struct ScriptedDispatcher {
        store: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        deploy_outcomes: Mutex<std::collections::VecDeque<Terminal>>,
        verify_outcome: Terminal,
        repair_branch: Mutex<Option<String>>,
    }

    impl ScriptedDispatcher {
        fn seed_terminal(&self, session_id: &SessionId, outcome: Terminal) {
            self.append(session_id, EventKind::Terminal { outcome, message: "done".to_string(), error: None });
        }

        fn append(&self, session_id: &SessionId, kind: EventKind) {
            let timestamp_ms = self.clock.now_ms();
            self.store.append(Event::new(session_id.clone(), timestamp_ms, kind)).unwrap();
        }
    }

    #[async_trait]
    impl Dispatcher for ScriptedDispatcher {
        async fn enqueue_deploy(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId {
            let id = SessionId::new(SessionKind::Deploy);
            self.append(&id, EventKind::SessionCreated {
                repo_url: repo_url.to_string(),
                branch: branch.to_string(),
                sub_path: sub_path.map(str::to_string),
            });
            let outcome = self.deploy_outcomes.lock().pop_front().unwrap_or(Terminal::Success);
            if outcome == Terminal::Success {
                self.append(&id, EventKind::DeployResourceRecorded {
                    name: "apiUrl".to_string(),
                    resource: "https://api.example.com".to_string().into(),
                });
            }
            self.seed_terminal(&id, outcome);
            id
        }

        async fn enqueue_verify(&self, repo_url: &str, branch: &str, sub_path: Option<&str>, _stack_info: serde_json::Value) -> SessionId {
            let id = SessionId::new(SessionKind::Verify);
            self.append(&id, EventKind::SessionCreated {
                repo_url: repo_url.to_string(),
                branch: branch.to_string(),
                sub_path: sub_path.map(str::to_string),
            });
            if self.verify_outcome == Terminal::Failed {
                self.append(&id, EventKind::VerifyScenarioResult {
                    name: "create then read".to_string(),
                    steps: vec![TestStepResult { status: TestStepStatus::Fail, duration_ms: 5, error: Some("boom".to_string()) }],
                });
            }
            self.seed_terminal(&id, self.verify_outcome);
            id
        }

        async fn enqueue_repair(
            &self,
            repo_url: &str,
            branch: &str,
            sub_path: Option<&str>,
            _fix_instructions: &str,
            _stack_info: Option<serde_json::Value>,
        ) -> SessionId {
            let id = SessionId::new(SessionKind::Repair);
            self.append(&id, EventKind::SessionCreated {
                repo_url: repo_url.to_string(),
                branch: branch.to_string(),
                sub_path: sub_path.map(str::to_string),
            });
            if let Some(branch_name) = self.repair_branch.lock().clone() {
                self.append(&id, EventKind::RepairBranchPublished { branch_name });
            }
            self.seed_terminal(&id, if self.repair_branch.lock().is_some() { Terminal::Success } else { Terminal::Failed });
            id
        }
    }

    fn request() -> SdlcRequest {
        SdlcRequest {
            session_id: SessionId::new(SessionKind::Sdlc),
            repo_url: "https://example.com/repo.git".to_string(),
            branch: "main".to_string(),
            sub_path: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_and_verify_success_reaches_s_ok() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(None),
        });
        let probe = Arc::new(ScriptedProbe { store: store.clone() });
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Success);
        let projection = store.project(&session_id).unwrap();
        assert_eq!(projection.terminal, Some(Terminal::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_failure_then_successful_repair_retries_and_succeeds() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::from([Terminal::Failed])),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(Some("fix/whatever".to_string())),
        });
        let probe = Arc::new(ScriptedProbe { store: store.clone() });
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        // First deploy fails, repair publishes a branch, the retried
        // attempt's deploy (the queue is now empty so it defaults to
        // success) reaches S_ok.
        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Success);
        let projection = store.project(&session_id).unwrap();
        assert_eq!(projection.sdlc.attempt_count, 2);
        assert!(projection.sdlc.attempts.iter().any(|a| a.repair_session_id.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn verify_failure_then_failed_repair_fails_the_run() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Failed,
            repair_branch: Mutex::new(None),
        });
        let probe = Arc::new(ScriptedProbe { store: store.clone() });
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);
        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_exceeded_fails_the_run() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(None),
        });
        // A probe that never reports a terminal outcome forces the
        // wall-clock budget to be the thing that ends the run.
        struct NeverReadyProbe;
        #[async_trait]
        impl StatusProbe for NeverReadyProbe {
            async fn project(&self, _session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
                Ok(None)
            }
        }
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe: Arc::new(NeverReadyProbe),
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_millis(10),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);
        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("wall-clock"));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_always_fails_exhausts_attempt_budget() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(Some("fix/whatever".to_string())),
        });
        // deploy_outcomes defaults to Success once the queue is drained, so
        // force every attempt to fail by wrapping a dispatcher whose deploy
        // always reports Failed.
        struct AlwaysFailDeploy(Arc<ScriptedDispatcher>);
        #[async_trait]
        impl Dispatcher for AlwaysFailDeploy {
            async fn enqueue_deploy(&self, repo_url: &str, branch: &str, sub_path: Option<&str>) -> SessionId {
                self.0.deploy_outcomes.lock().push_back(Terminal::Failed);
                self.0.enqueue_deploy(repo_url, branch, sub_path).await
            }

            async fn enqueue_verify(&self, repo_url: &str, branch: &str, sub_path: Option<&str>, stack_info: serde_json::Value) -> SessionId {
                self.0.enqueue_verify(repo_url, branch, sub_path, stack_info).await
            }

            async fn enqueue_repair(
                &self,
                repo_url: &str,
                branch: &str,
                sub_path: Option<&str>,
                fix_instructions: &str,
                stack_info: Option<serde_json::Value>,
            ) -> SessionId {
                self.0.enqueue_repair(repo_url, branch, sub_path, fix_instructions, stack_info).await
            }
        }
        let probe = Arc::new(ScriptedProbe { store: store.clone() });
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher: Arc::new(AlwaysFailDeploy(dispatcher)),
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 2,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);
        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("attempt budget"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_probe_failures_within_tolerance_do_not_fail_the_run() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(None),
        });

        /// Fails the first `remaining_failures` probes, then delegates to
        /// a real store-backed probe.
        struct FlakyProbe {
            inner: StoreStatusProbe,
            remaining_failures: Mutex<u32>,
        }
        #[async_trait]
        impl StatusProbe for FlakyProbe {
            async fn project(&self, session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
                let mut remaining = self.remaining_failures.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(CoordinatorError::Probe("simulated transient failure".to_string()));
                }
                drop(remaining);
                self.inner.project(session_id).await
            }
        }
        let probe = Arc::new(FlakyProbe { inner: StoreStatusProbe { store: store.clone() }, remaining_failures: Mutex::new(3) });
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Success);
        let projection = store.project(&session_id).unwrap();
        assert_eq!(projection.terminal, Some(Terminal::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_check_before_repair_enqueue_catches_expiry_during_the_deploy_await() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::from([Terminal::Failed])),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(Some("fix/whatever".to_string())),
        });

        /// `await_terminal` only checks the deadline at the top of its own
        /// poll loop, before calling the probe. This probe jumps the
        /// (paused) clock past the budget on its first call and then
        /// reports the real terminal state, reproducing the gap: the
        /// deploy session is reported terminal at a time past the budget,
        /// but not by a deadline check inside `await_terminal` itself.
        struct TimeJumpingProbe {
            inner: StoreStatusProbe,
            jumped: Mutex<bool>,
        }
        #[async_trait]
        impl StatusProbe for TimeJumpingProbe {
            async fn project(&self, session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
                let mut jumped = self.jumped.lock();
                if !*jumped {
                    *jumped = true;
                    drop(jumped);
                    tokio::time::advance(Duration::from_secs(3600)).await;
                }
                self.inner.project(session_id).await
            }
        }
        let probe = Arc::new(TimeJumpingProbe { inner: StoreStatusProbe { store: store.clone() }, jumped: Mutex::new(false) });

        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 5,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);

        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("wall-clock"));
        // the repair job must never have been enqueued once the budget had
        // already elapsed, even though the deploy await itself returned
        // successfully.
        assert!(projection.sdlc.attempts.iter().all(|a| a.repair_session_id.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_consecutive_transient_probe_failures_fails_the_run() {
        let store = Arc::new(SessionStore::in_memory());
        let dispatcher = Arc::new(ScriptedDispatcher {
            store: store.clone(),
            clock: Arc::new(SystemClock),
            deploy_outcomes: Mutex::new(std::collections::VecDeque::new()),
            verify_outcome: Terminal::Success,
            repair_branch: Mutex::new(None),
        });
        struct AlwaysFailingProbe;
        #[async_trait]
        impl StatusProbe for AlwaysFailingProbe {
            async fn project(&self, _session_id: &SessionId) -> Result<Option<Projection>, CoordinatorError> {
                Err(CoordinatorError::Probe("simulated transient failure".to_string()))
            }
        }
        let worker = CoordinatorWorker {
            store: store.clone(),
            dispatcher,
            probe: Arc::new(AlwaysFailingProbe),
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_millis(1),
            wall_clock_budget: Duration::from_secs(60),
            max_attempts: 3,
            transient_failure_tolerance: 2,
        };

        let req = request();
        let session_id = req.session_id.clone();
        let outcome = worker.run(req).await;
        assert_eq!(outcome, Terminal::Failed);
        let projection = store.project(&session_id).unwrap();
        assert!(projection.error.unwrap().contains("consecutive transient"));
    }
}
