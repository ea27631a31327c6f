//! # flightvisor
//!
//! **Flightvisor** runs a drone telemetry/command pipeline as groups of
//! cooperative workers connected by bounded queues, and shuts it down without
//! deadlocking on full or empty queues.
//!
//! The orchestration layer (controller, queues, worker groups, orchestrator)
//! is generic; the flight roles and the [`app`] composition root build the
//! concrete pipeline on top of it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//!     │ WorkerProperties │ │ WorkerProperties │ │ WorkerProperties │
//!     │   (telemetry)    │ │    (command)     │ │   (heartbeat)    │
//!     └────────┬─────────┘ └────────┬─────────┘ └────────┬─────────┘
//!              ▼                    ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Controller (exit / pause flags shared by every replica)        │
//! │  - queues (registered for the shutdown drain)                     │
//! │  - WorkerManager per group (JoinSet of replicas)                  │
//! │  - Bus + AliveTracker + SubscriberSet                             │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!    ┌─────────┐        ┌─────────┐        ┌─────────┐         │
//!    │ replica │ ─put─► │  queue  │ ─get─► │ replica │         │
//!    └────┬────┘        └─────────┘        └────┬────┘         │
//!         │ ReplicaStarting / Paused / Exiting  │              │
//!         │ ReplicaStopped / Failed / Crashed   │              │
//!         ▼                                     ▼              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                   Bus (broadcast channel)                         │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │    event listener      │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                    AliveTracker     SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ### Replica loop
//! ```text
//! while ctx.running().await {        // false once exit is requested,
//!     let item = ctx.recv().await;   // parks while paused
//!     ...
//!     ctx.send(out).await;           // bounded retries, then drop
//! }
//! ```
//!
//! ### Shutdown
//! ```text
//! request_exit ──► fill_and_drain(q) for q in DrainPlan ──► join (grace) ──► report
//! ```
//!
//! ## Features
//! | Area            | Description                                            | Key types                                  |
//! |-----------------|--------------------------------------------------------|--------------------------------------------|
//! | **Control**     | Exit and pause flags observed at poll points.          | [`Controller`]                             |
//! | **Queues**      | Bounded FIFO with timeouts and a shutdown drain.       | [`BoundedQueue`], [`Drain`]                |
//! | **Workers**     | Entry-point contract and per-replica context.          | [`Worker`], [`WorkerContext`]              |
//! | **Groups**      | Validated descriptors and replica lifecycle.           | [`WorkerProperties`], [`WorkerManager`]    |
//! | **Runtime**     | Composition, drain order, shutdown protocol.           | [`Orchestrator`], [`DrainPlan`]            |
//! | **Events**      | Lifecycle events and subscribers.                      | [`Event`], [`Subscribe`]                   |
//! | **Errors**      | Typed errors per layer.                                | [`RuntimeError`], [`WorkError`]            |
//! | **Flight**      | Vehicle link, roles and the pipeline itself.           | [`link::FlightLink`], [`roles`], [`app`]   |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flightvisor::{Orchestrator, OrchestratorConfig, WorkError, WorkerContext, WorkerProperties};
//!
//! async fn source(_: (), ctx: WorkerContext<(), u32>) -> Result<(), WorkError> {
//!     while ctx.running().await {
//!         ctx.send(7).await;
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut orch = Orchestrator::builder(OrchestratorConfig::default()).build()?;
//!     let out = orch.queue::<u32>("out", 4);
//!     orch.add_group(WorkerProperties::create(
//!         "source", 2, source, (), vec![], vec![out.clone()], orch.controller(),
//!     )?)?;
//!
//!     let report = orch
//!         .run(|_| async move {
//!             assert_eq!(out.get(Duration::from_secs(1)).await, Some(7));
//!         })
//!         .await?;
//!     assert!(report.joined.is_clean());
//!     Ok(())
//! }
//! ```

mod config;
mod controller;
mod core;
mod error;
mod events;
mod group;
mod queue;
mod subscribers;
mod workers;

pub mod app;
pub mod link;
pub mod roles;

// ---- Public re-exports ----

pub use config::{Config, QueueSizes, WorkerCounts};
pub use controller::Controller;
pub use core::{
    AliveTracker, DrainPlan, Orchestrator, OrchestratorBuilder, OrchestratorConfig, SINK,
    ShutdownReport, TerminationSignal, Wiring, wait_for_shutdown_signal,
};
pub use error::{
    ConfigError, LinkError, PipelineError, RuntimeError, WorkError, WorkerGroupError,
};
pub use events::{Bus, Event, EventKind};
pub use group::{
    DEFAULT_POLL_TIMEOUT, GroupState, JoinReport, ReplicaId, ReplicaState, WorkerManager,
    WorkerProperties,
};
pub use queue::{BoundedQueue, Drain, QueueId, QueueRef};
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{BoxWorkFuture, SEND_ATTEMPTS, Worker, WorkerContext, WorkerRef};

// Built-in logger subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
