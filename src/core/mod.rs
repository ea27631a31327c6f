//! Runtime core: orchestration and the shutdown protocol.
//!
//! The public entry point is [`Orchestrator`], built through
//! [`OrchestratorBuilder`].
//!
//! Internal modules:
//! - [`orchestrator`]: queue registry, group lifecycle, drain/join sequence;
//! - [`builder`]: bus, subscriber fan-out and event listener wiring;
//! - [`pipeline`]: drain order computed from the queue wiring;
//! - [`alive`]: per-replica state tracked from lifecycle events;
//! - [`shutdown`]: cross-platform termination signal handling;
//! - [`config`]: orchestrator settings.

mod alive;
mod builder;
mod config;
mod orchestrator;
mod pipeline;
mod shutdown;

pub use alive::AliveTracker;
pub use builder::OrchestratorBuilder;
pub use config::OrchestratorConfig;
pub use orchestrator::{Orchestrator, ShutdownReport};
pub use pipeline::{DrainPlan, SINK, Wiring};
pub use shutdown::{TerminationSignal, wait_for_shutdown_signal};
