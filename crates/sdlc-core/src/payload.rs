use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::iac::IacKind;
use crate::session::SessionId;

/// Deployment Worker payload (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployPayload {
    pub iac_kind: Option<IacKind>,
    pub artifact_key: Option<String>,
    #[serde(default)]
    pub deployed_resources: BTreeMap<String, DeployedResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeployedResource {
    Scalar(String),
}

impl From<String> for DeployedResource {
    fn from(value: String) -> Self {
        DeployedResource::Scalar(value)
    }
}

impl DeployedResource {
    pub fn as_str(&self) -> &str {
        match self {
            DeployedResource::Scalar(s) => s,
        }
    }
}

/// Discovered HTTP API surface plus the synthesized test suite and its
/// per-step execution results (spec.md §3, §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyPayload {
    pub base_url: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<DiscoveredEndpoint>,
    pub authentication: Option<serde_json::Value>,
    #[serde(default)]
    pub scenarios: Vec<VerifyScenarioResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredEndpoint {
    pub method: String,
    pub path: String,
    pub description: Option<String>,
    #[serde(rename = "requestSchema")]
    pub request_schema: Option<serde_json::Value>,
    #[serde(rename = "responseSchema")]
    pub response_schema: Option<serde_json::Value>,
    pub authentication: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyScenarioResult {
    pub name: String,
    pub steps: Vec<TestStepResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStepStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStepResult {
    pub status: TestStepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Repair Worker payload (spec.md §3, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairPayload {
    pub fix_instructions: Option<String>,
    pub plan_summary: Option<String>,
    #[serde(default)]
    pub plan_steps: Vec<String>,
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    pub branch_name: Option<String>,
}

/// SDLC Coordinator payload (spec.md §3, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdlcPayload {
    #[serde(default)]
    pub attempts: Vec<SdlcAttempt>,
    pub attempt_count: u32,
    pub wall_clock_deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdlcAttempt {
    pub attempt: u32,
    pub deploy_session_id: Option<SessionId>,
    pub verify_session_id: Option<SessionId>,
    pub repair_session_id: Option<SessionId>,
}
