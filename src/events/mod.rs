//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Orchestrator` (shutdown protocol), `WorkerManager`
//!   (group start/join, crashes), `WorkerContext` (replica lifecycle),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the orchestrator's listener, which fans out to the
//!   `SubscriberSet` and updates the `AliveTracker`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
