use serde::{Deserialize, Serialize};

use crate::dto::SessionDto;

/// The free-text / structured fields an `EnqueueRequest` needs per kind
/// (spec.md §6: `/deploy`, `/sanity-test`, `/fix`, `/sdlc-deploy`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EnqueueRequest {
    Deploy {
        #[serde(rename = "repoUrl")]
        repo_url: String,
        branch: String,
        #[serde(rename = "subPath", default)]
        sub_path: Option<String>,
    },
    SanityTest {
        #[serde(rename = "repoUrl")]
        repo_url: String,
        branch: String,
        #[serde(rename = "subPath", default)]
        sub_path: Option<String>,
        #[serde(rename = "stackInfo")]
        stack_info: serde_json::Value,
    },
    Fix {
        #[serde(rename = "repoUrl")]
        repo_url: String,
        branch: String,
        #[serde(rename = "subPath", default)]
        sub_path: Option<String>,
        #[serde(rename = "fixInstructions")]
        fix_instructions: String,
        #[serde(rename = "stackInfo", default)]
        stack_info: Option<serde_json::Value>,
    },
    SdlcDeploy {
        #[serde(rename = "repoUrl")]
        repo_url: String,
        branch: String,
        #[serde(rename = "subPath", default)]
        sub_path: Option<String>,
    },
}

/// Requests the CLI (or any local caller) sends over the socket. Mirrors
/// spec.md §6's HTTP surface one-for-one, minus the network listener
/// itself (spec.md §1 treats that frontend as an external collaborator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    Enqueue {
        #[serde(flatten)]
        request: EnqueueRequest,
    },
    GetStatus {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    ListSessions {
        #[serde(default)]
        phase: Option<String>,
    },
}

/// Responses the supervisor sends back. `Enqueued` mirrors spec.md §6's
/// `202 Accepted` shape (`{sessionId, status: "pending", message, ...echoed
/// fields}`); `Status`/`Sessions` mirror the projection response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Enqueued {
        #[serde(rename = "sessionId")]
        session_id: String,
        status: String,
        message: String,
        #[serde(rename = "repoUrl")]
        repo_url: String,
        branch: String,
        #[serde(rename = "subPath")]
        sub_path: Option<String>,
    },
    Status {
        session: SessionDto,
    },
    Sessions {
        sessions: Vec<SessionDto>,
    },
    Error {
        message: String,
    },
}
