use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

use crate::error::CoreError;

/// The four session kinds, distinguished by an id prefix (spec.md §3/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Deploy,
    Verify,
    Repair,
    Sdlc,
}

impl SessionKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SessionKind::Deploy => "deploy-",
            SessionKind::Verify => "verify-",
            SessionKind::Repair => "repair-",
            SessionKind::Sdlc => "sdlc-",
        }
    }

    /// The worker's phase lattice, in monotonic order, ending in a terminal
    /// phase. Used to validate that `project()` never observes a phase
    /// regression for a given session.
    pub fn phase_lattice(self) -> &'static [&'static str] {
        match self {
            SessionKind::Deploy => {
                &["pending", "cloning", "detecting", "packaging", "provisioning", "polling", "terminal"]
            }
            SessionKind::Verify => {
                &["pending", "cloning", "scanning", "discovering", "generating", "executing", "terminal"]
            }
            SessionKind::Repair => {
                &["pending", "cloning", "planning", "rewriting", "branching", "pushing", "terminal"]
            }
            SessionKind::Sdlc => &[
                "pending", "s0_start", "s1_await_deploy", "s2_start_verify", "s3_await_verify",
                "s4_start_repair", "s5_await_repair", "terminal",
            ],
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionKind::Deploy => "deploy",
            SessionKind::Verify => "verify",
            SessionKind::Repair => "repair",
            SessionKind::Sdlc => "sdlc",
        })
    }
}

/// Globally unique session identifier: a kind prefix plus a 36-character
/// UUID-v4 token, e.g. `deploy-3fa85f64-5717-4562-b3fc-2c963f66afa6`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId {
    kind: SessionKind,
    raw: SmolStr,
}

impl SessionId {
    pub fn new(kind: SessionKind) -> Self {
        let token = Uuid::new_v4();
        let raw = SmolStr::new(format!("{}{}", kind.prefix(), token));
        Self { kind, raw }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SessionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, token) = [
            (SessionKind::Deploy, SessionKind::Deploy.prefix()),
            (SessionKind::Verify, SessionKind::Verify.prefix()),
            (SessionKind::Repair, SessionKind::Repair.prefix()),
            (SessionKind::Sdlc, SessionKind::Sdlc.prefix()),
        ]
        .into_iter()
        .find_map(|(kind, prefix)| s.strip_prefix(prefix).map(|rest| (kind, rest)))
        .ok_or_else(|| CoreError::InvalidSessionId { id: s.to_string() })?;

        if Uuid::parse_str(token).is_err() {
            return Err(CoreError::InvalidSessionId { id: s.to_string() });
        }

        Ok(Self { kind, raw: SmolStr::new(s) })
    }
}

impl TryFrom<String> for SessionId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.raw.to_string()
    }
}

/// Per-kind worker phase. Free-form beyond the lattice check so new phases
/// never require a core-crate release, but `SessionKind::phase_lattice`
/// documents the canonical ordering each worker follows.
pub type Phase = SmolStr;

/// Terminal outcome of a session, unset until a worker (or the coordinator)
/// writes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    Success,
    Failed,
}
