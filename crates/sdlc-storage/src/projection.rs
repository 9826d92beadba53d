use sdlc_core::{
    DeployPayload, EventKind, IacKind, RepairPayload, SdlcPayload, SessionId, SessionKind,
    Terminal, VerifyPayload, VerifyScenarioResult,
};

/// "Latest state + ordered log" view of a session, collapsed from its
/// event stream (spec.md §3, §4.1): last-writer-wins on every scalar
/// field, log lines concatenated in timestamp order.
#[derive(Debug, Clone)]
pub struct Projection {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
    pub phase: String,
    pub terminal: Option<Terminal>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub log: Vec<String>,
    pub last_updated_ms: u64,
    pub deploy: DeployPayload,
    pub verify: VerifyPayload,
    pub repair: RepairPayload,
    pub sdlc: SdlcPayload,
}

impl Projection {
    pub(crate) fn seed(session_id: SessionId) -> Self {
        let kind = session_id.kind();
        Self {
            session_id,
            kind,
            repo_url: String::new(),
            branch: String::new(),
            sub_path: None,
            phase: "pending".to_string(),
            terminal: None,
            message: None,
            error: None,
            log: Vec::new(),
            last_updated_ms: 0,
            deploy: DeployPayload::default(),
            verify: VerifyPayload::default(),
            repair: RepairPayload::default(),
            sdlc: SdlcPayload::default(),
        }
    }

    /// Idempotent per-event fold. Re-applying the same (timestamp, kind)
    /// twice must never change the result: every arm assigns rather than
    /// increments, and collections are only ever appended to via a value
    /// keyed by something stable (so a duplicate event would need to be
    /// filtered upstream by the store — see `SessionStore::append`).
    pub(crate) fn apply(&mut self, timestamp_ms: u64, kind: &EventKind) {
        self.last_updated_ms = self.last_updated_ms.max(timestamp_ms);
        match kind {
            EventKind::SessionCreated { repo_url, branch, sub_path } => {
                self.repo_url = repo_url.clone();
                self.branch = branch.clone();
                self.sub_path = sub_path.clone();
            }
            EventKind::PhaseChanged { phase } => {
                self.phase = phase.clone();
            }
            EventKind::Message { message } => {
                self.message = Some(message.clone());
            }
            EventKind::Log { line } => {
                self.log.push(line.clone());
            }
            EventKind::Terminal { outcome, message, error } => {
                self.phase = "terminal".to_string();
                self.terminal = Some(*outcome);
                self.message = Some(message.clone());
                self.error = error.clone();
            }
            EventKind::DeployIacDetected { iac_kind } => {
                self.deploy.iac_kind = Some(*iac_kind);
            }
            EventKind::DeployArtifactPackaged { artifact_key } => {
                self.deploy.artifact_key = Some(artifact_key.clone());
            }
            EventKind::DeployResourceRecorded { name, resource } => {
                self.deploy.deployed_resources.insert(name.clone(), resource.clone());
            }
            EventKind::VerifyApiDiscovered { base_url, endpoints, authentication } => {
                self.verify.base_url = base_url.clone();
                self.verify.endpoints = endpoints.clone();
                self.verify.authentication = authentication.clone();
            }
            EventKind::VerifyScenarioResult { name, steps } => {
                if let Some(existing) = self.verify.scenarios.iter_mut().find(|s| &s.name == name) {
                    existing.steps = steps.clone();
                } else {
                    self.verify.scenarios.push(VerifyScenarioResult { name: name.clone(), steps: steps.clone() });
                }
            }
            EventKind::RepairPlanProduced { summary, steps, files_to_modify } => {
                self.repair.plan_summary = Some(summary.clone());
                self.repair.plan_steps = steps.clone();
                self.repair.files_to_modify = files_to_modify.clone();
            }
            EventKind::RepairBranchPublished { branch_name } => {
                self.repair.branch_name = Some(branch_name.clone());
            }
            EventKind::SdlcAttemptStarted { attempt, deploy_session_id } => {
                self.sdlc.attempt_count = self.sdlc.attempt_count.max(*attempt);
                upsert_attempt(&mut self.sdlc, *attempt).deploy_session_id = Some(deploy_session_id.clone());
            }
            EventKind::SdlcVerifyStarted { attempt, verify_session_id } => {
                upsert_attempt(&mut self.sdlc, *attempt).verify_session_id = Some(verify_session_id.clone());
            }
            EventKind::SdlcRepairStarted { attempt, repair_session_id } => {
                upsert_attempt(&mut self.sdlc, *attempt).repair_session_id = Some(repair_session_id.clone());
            }
            EventKind::SdlcDeadlineSet { deadline_ms } => {
                self.sdlc.wall_clock_deadline_ms = Some(*deadline_ms);
            }
        }
    }

    /// True once a verify scenario has recorded at least one failing step.
    pub fn has_failed_verify_step(&self) -> bool {
        self.verify
            .scenarios
            .iter()
            .flat_map(|s| s.steps.iter())
            .any(|step| step.status == sdlc_core::TestStepStatus::Fail)
    }

    pub fn iac_kind(&self) -> Option<IacKind> {
        self.deploy.iac_kind
    }
}

fn upsert_attempt(payload: &mut SdlcPayload, attempt: u32) -> &mut sdlc_core::SdlcAttempt {
    if let Some(idx) = payload.attempts.iter().position(|a| a.attempt == attempt) {
        return &mut payload.attempts[idx];
    }
    payload.attempts.push(sdlc_core::SdlcAttempt {
        attempt,
        deploy_session_id: None,
        verify_session_id: None,
        repair_session_id: None,
    });
    payload.attempts.last_mut().expect("just pushed")
}
