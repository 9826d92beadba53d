#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Session Supervisor (spec.md §4, §9): the long-running process that owns
//! the session store and artifact store, the four re-enqueue-with-delay
//! job queues, and the adapters every worker is constructed with. It is
//! the thing spec.md §6's HTTP frontend would sit in front of; here it is
//! reached over a local Unix domain socket instead (spec.md §1 keeps the
//! network listener itself out of scope).

pub mod dispatch;
pub mod housekeeping;
pub mod queue_runner;
pub mod socket;
pub mod supervisor;

pub use dispatch::SupervisorDispatcher;
pub use queue_runner::QueueRunner;
pub use supervisor::Supervisor;
