#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Boundary traits over every external SDK the SDLC control plane talks
//! to: the language model, the cloud provisioning API, git, HTTP probes
//! against deployed targets, and the in-process delay queue workers and
//! the coordinator share for re-enqueue-with-delay waits (spec.md §2,
//! §9). Workers depend on these traits, never on a concrete SDK client,
//! so tests substitute the `Fake*` adapters gated behind `test-support`.

pub mod ai;
pub mod cloud;
pub mod error;
pub mod git;
pub mod http_probe;
pub mod json_reply;
pub mod queue;
pub mod retry;

pub use ai::{AiAdapter, HttpAiAdapter};
pub use cloud::{CloudAdapter, FunctionInfo, StackEvent, StackStatus, UnconfiguredCloudAdapter};
pub use error::AdaptersError;
pub use git::{Committer, GitAdapter, RealGitAdapter};
pub use http_probe::{HttpProbeAdapter, ProbeResponse, ReqwestProbeAdapter};
pub use json_reply::{complete_json_with_retry, extract_json_object};
pub use queue::DelayQueue;
pub use retry::retry_transient;

#[cfg(any(test, feature = "test-support"))]
pub use ai::FakeAiAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use cloud::FakeCloudAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use git::FakeGitAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use http_probe::{FakeHttpProbeAdapter, ScriptedReply};
