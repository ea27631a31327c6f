//! # Runtime events emitted by the orchestrator, worker groups and replicas.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Shutdown events**: the drain/join protocol driven by the orchestrator
//! - **Group events**: worker groups being started and joined
//! - **Replica events**: lifecycle of one replica inside a group
//! - **Subscriber events**: problems inside the observer fan-out
//!
//! The [`Event`] struct carries metadata such as timestamps, the emitting
//! replica or group, the queue involved, reasons, and counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically starting from 1. Use `seq` to restore the exact order when
//! events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use flightvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::QueueDrained)
//!     .with_queue("telemetry")
//!     .with_count(3);
//!
//! assert_eq!(ev.kind, EventKind::QueueDrained);
//! assert_eq!(ev.queue.as_deref(), Some("telemetry"));
//! assert_eq!(ev.count, Some(3));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// OS termination signal observed.
    ///
    /// Sets:
    /// - `reason`: signal name
    ShutdownRequested,

    /// Exit flag raised; the drain is about to start.
    ExitRequested,

    /// One queue went through `fill_and_drain`.
    ///
    /// Sets:
    /// - `queue`: queue name
    /// - `count`: residual items discarded
    QueueDrained,

    /// Every replica terminated (within the grace period, when one is set).
    ///
    /// Sets:
    /// - `count`: number of replicas joined
    AllStoppedWithin,

    /// Grace period exceeded; the replicas still running are aborted next.
    ///
    /// Sets:
    /// - `reason`: comma separated `replica=last_state` entries
    /// - `timeout_ms`: configured grace (ms)
    GraceExceeded,

    // === Group events ===
    /// All replicas of a group were spawned.
    ///
    /// Sets:
    /// - `source`: group name
    /// - `count`: replica count
    GroupStarted,

    /// All replicas of a group terminated and were joined.
    ///
    /// Sets:
    /// - `source`: group name
    /// - `count`: replicas joined
    GroupJoined,

    // === Replica lifecycle events ===
    /// Replica spawned and about to call its entry point.
    ///
    /// Sets:
    /// - `source`: replica id (`group#index`)
    ReplicaStarting,

    /// Replica parked on the pause flag.
    ///
    /// Sets:
    /// - `source`: replica id
    ReplicaPaused,

    /// Replica released from a pause.
    ///
    /// Sets:
    /// - `source`: replica id
    ReplicaResumed,

    /// Replica observed the exit flag and is leaving its loop.
    ///
    /// Sets:
    /// - `source`: replica id
    ReplicaExiting,

    /// Replica's entry point returned normally.
    ///
    /// Sets:
    /// - `source`: replica id
    ReplicaStopped,

    /// Replica's entry point returned a fatal error.
    ///
    /// Sets:
    /// - `source`: replica id
    /// - `reason`: error message
    ReplicaFailed,

    /// Replica panicked; detected when its group was joined.
    ///
    /// Sets:
    /// - `source`: replica id
    /// - `reason`: panic message
    ReplicaCrashed,

    /// Replica was still running when the join grace ran out and was aborted.
    ///
    /// Sets:
    /// - `source`: replica id
    ReplicaAborted,

    // === Data path ===
    /// A replica gave up putting an item into an output queue.
    ///
    /// Sets:
    /// - `source`: replica id
    /// - `queue`: queue name
    ItemDropped,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::ExitRequested => "exit_requested",
            EventKind::QueueDrained => "queue_drained",
            EventKind::AllStoppedWithin => "all_stopped_within",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::GroupStarted => "group_started",
            EventKind::GroupJoined => "group_joined",
            EventKind::ReplicaStarting => "replica_starting",
            EventKind::ReplicaPaused => "replica_paused",
            EventKind::ReplicaResumed => "replica_resumed",
            EventKind::ReplicaExiting => "replica_exiting",
            EventKind::ReplicaStopped => "replica_stopped",
            EventKind::ReplicaFailed => "replica_failed",
            EventKind::ReplicaCrashed => "replica_crashed",
            EventKind::ReplicaAborted => "replica_aborted",
            EventKind::ItemDropped => "item_dropped",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Emitting replica, group or subscriber.
    pub source: Option<Arc<str>>,
    /// Queue involved, if any.
    pub queue: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Counter attached to the event (items drained, replicas joined, ...).
    pub count: Option<u64>,
    /// Timeout or grace in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            queue: None,
            reason: None,
            count: None,
            timeout_ms: None,
        }
    }

    /// Attaches the emitting replica, group or subscriber name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a queue name.
    #[inline]
    pub fn with_queue(mut self, queue: impl Into<Arc<str>>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n as u64);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
