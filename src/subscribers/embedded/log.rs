//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns every incoming [`Event`] into one structured
//! `tracing` record under the `flightvisor::events` target. Replica
//! failures and crashes are logged at `error`, drops and grace overruns at
//! `warn`, shutdown progress at `info`, and per-replica chatter at `debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  flightvisor::events: exit requested seq=412
//! INFO  flightvisor::events: queue drained seq=413 queue="command" drained=0
//! WARN  flightvisor::events: item dropped seq=97 replica="telemetry#0" queue="telemetry"
//! ERROR flightvisor::events: replica crashed seq=418 replica="command#0" reason="boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "flightvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let seq = e.seq;
        let src = e.source.as_deref().unwrap_or("-");
        let queue = e.queue.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ShutdownRequested => {
                tracing::info!(target: TARGET, seq, signal = reason, "shutdown requested");
            }
            EventKind::ExitRequested => {
                tracing::info!(target: TARGET, seq, "exit requested");
            }
            EventKind::QueueDrained => {
                tracing::info!(target: TARGET, seq, queue, drained = e.count, "queue drained");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: TARGET, seq, replicas = e.count, "all replicas stopped");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: TARGET, seq, grace_ms = e.timeout_ms, stuck = reason, "grace exceeded");
            }
            EventKind::GroupStarted => {
                tracing::info!(target: TARGET, seq, group = src, replicas = e.count, "group started");
            }
            EventKind::GroupJoined => {
                tracing::info!(target: TARGET, seq, group = src, replicas = e.count, "group joined");
            }
            EventKind::ReplicaStarting => {
                tracing::debug!(target: TARGET, seq, replica = src, "replica starting");
            }
            EventKind::ReplicaPaused => {
                tracing::debug!(target: TARGET, seq, replica = src, "replica paused");
            }
            EventKind::ReplicaResumed => {
                tracing::debug!(target: TARGET, seq, replica = src, "replica resumed");
            }
            EventKind::ReplicaExiting => {
                tracing::debug!(target: TARGET, seq, replica = src, "replica exiting");
            }
            EventKind::ReplicaStopped => {
                tracing::debug!(target: TARGET, seq, replica = src, "replica stopped");
            }
            EventKind::ReplicaFailed => {
                tracing::error!(target: TARGET, seq, replica = src, reason, "replica failed");
            }
            EventKind::ReplicaCrashed => {
                tracing::error!(target: TARGET, seq, replica = src, reason, "replica crashed");
            }
            EventKind::ReplicaAborted => {
                tracing::warn!(target: TARGET, seq, replica = src, "replica aborted");
            }
            EventKind::ItemDropped => {
                tracing::warn!(target: TARGET, seq, replica = src, queue, "item dropped");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, seq, subscriber = src, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: TARGET, seq, subscriber = src, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
