use chrono::{DateTime, Utc};
use sdlc_core::{DeployPayload, RepairPayload, SdlcPayload, Terminal, VerifyPayload};
use sdlc_storage::Projection;
use serde::{Deserialize, Serialize};

/// Wire-format projection of a session: the full status view spec.md §6
/// says a projection response carries, plus an ISO-8601 `lastUpdated`
/// derived from the projection's millisecond timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDto {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub kind: String,
    #[serde(rename = "repoUrl")]
    pub repo_url: String,
    pub branch: String,
    #[serde(rename = "subPath")]
    pub sub_path: Option<String>,
    pub phase: String,
    pub status: Option<Terminal>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub log: Vec<String>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
    pub deploy: DeployPayload,
    pub verify: VerifyPayload,
    pub repair: RepairPayload,
    pub sdlc: SdlcPayload,
}

impl From<&Projection> for SessionDto {
    fn from(projection: &Projection) -> Self {
        Self {
            session_id: projection.session_id.as_str().to_string(),
            kind: projection.kind.to_string(),
            repo_url: projection.repo_url.clone(),
            branch: projection.branch.clone(),
            sub_path: projection.sub_path.clone(),
            phase: projection.phase.clone(),
            status: projection.terminal,
            message: projection.message.clone(),
            error: projection.error.clone(),
            log: projection.log.clone(),
            last_updated: last_updated_iso8601(projection.last_updated_ms),
            deploy: projection.deploy.clone(),
            verify: projection.verify.clone(),
            repair: projection.repair.clone(),
            sdlc: projection.sdlc.clone(),
        }
    }
}

fn last_updated_iso8601(timestamp_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).expect("epoch is representable"))
        .to_rfc3339()
}
