use serde::{Deserialize, Serialize};

use crate::iac::IacKind;
use crate::payload::{DeployedResource, DiscoveredEndpoint, TestStepResult};
use crate::session::{SessionId, Terminal};

/// One entry in a session's append-only event log (spec.md §3, §4.1).
///
/// `timestamp_ms` is assigned by the appender and must be monotonic within
/// a single worker invocation; across invocations there is no global order
/// (spec.md §5) and the projection's last-writer-wins rule is what makes
/// that tolerable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub session_id: SessionId,
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: SessionId, timestamp_ms: u64, kind: EventKind) -> Self {
        Self { session_id, timestamp_ms, kind }
    }
}

/// Kind-specific deltas. A projection applies these idempotently: repeated
/// delivery of the same event (same session id, same timestamp) must never
/// change the outcome, so every variant here is an assignment, never an
/// increment or append-in-place over mutable collections the projection
/// could double-apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "session:created")]
    SessionCreated { repo_url: String, branch: String, sub_path: Option<String> },

    #[serde(rename = "session:phase")]
    PhaseChanged { phase: String },

    #[serde(rename = "session:message")]
    Message { message: String },

    #[serde(rename = "session:log")]
    Log { line: String },

    #[serde(rename = "session:terminal")]
    Terminal { outcome: Terminal, message: String, error: Option<String> },

    #[serde(rename = "deploy:iac-detected")]
    DeployIacDetected { iac_kind: IacKind },

    #[serde(rename = "deploy:artifact-packaged")]
    DeployArtifactPackaged { artifact_key: String },

    #[serde(rename = "deploy:resource-recorded")]
    DeployResourceRecorded { name: String, resource: DeployedResource },

    #[serde(rename = "verify:api-discovered")]
    VerifyApiDiscovered {
        base_url: Option<String>,
        endpoints: Vec<DiscoveredEndpoint>,
        authentication: Option<serde_json::Value>,
    },

    #[serde(rename = "verify:scenario-result")]
    VerifyScenarioResult { name: String, steps: Vec<TestStepResult> },

    #[serde(rename = "repair:plan-produced")]
    RepairPlanProduced { summary: String, steps: Vec<String>, files_to_modify: Vec<String> },

    #[serde(rename = "repair:branch-published")]
    RepairBranchPublished { branch_name: String },

    #[serde(rename = "sdlc:attempt-started")]
    SdlcAttemptStarted { attempt: u32, deploy_session_id: SessionId },

    #[serde(rename = "sdlc:verify-started")]
    SdlcVerifyStarted { attempt: u32, verify_session_id: SessionId },

    #[serde(rename = "sdlc:repair-started")]
    SdlcRepairStarted { attempt: u32, repair_session_id: SessionId },

    #[serde(rename = "sdlc:deadline-set")]
    SdlcDeadlineSet { deadline_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionKind;

    #[test]
    fn event_round_trips_through_json() {
        let event = Event::new(
            SessionId::new(SessionKind::Deploy),
            42,
            EventKind::PhaseChanged { phase: "cloning".into() },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timestamp_ms, 42);
    }

    #[test]
    fn terminal_event_tag_is_stable() {
        let event = EventKind::Terminal {
            outcome: Terminal::Success,
            message: "ok".into(),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session:terminal");
    }
}
