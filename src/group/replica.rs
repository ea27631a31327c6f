use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::events::{Bus, Event, EventKind};
use crate::workers::BoxWorkFuture;

/// Identity of one replica: the group name plus its index within the group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId {
    group: Arc<str>,
    index: usize,
}

impl ReplicaId {
    /// Creates the id of replica `index` of `group`.
    pub fn new(group: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            group: group.into(),
            index,
        }
    }

    /// Group name.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Zero-based index within the group.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.group, self.index)
    }
}

/// Observable state of a replica.
///
/// ```text
/// Running ⇄ Paused ──► Exiting ──► Terminated
///    ├──────────────── (panic) ──► Crashed
///    └──────────── (grace out) ──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaState {
    /// Inside its loop doing work.
    Running,
    /// Parked on the pause flag.
    Paused,
    /// Observed exit and is leaving its loop.
    Exiting,
    /// Entry point returned (cleanly or with an error).
    Terminated,
    /// Panicked.
    Crashed,
    /// Still running when the join grace ran out; aborted by its group.
    Aborted,
}

impl ReplicaState {
    /// True while the replica may still issue queue operations.
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            ReplicaState::Running | ReplicaState::Paused | ReplicaState::Exiting
        )
    }

    /// Short lowercase label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            ReplicaState::Running => "running",
            ReplicaState::Paused => "paused",
            ReplicaState::Exiting => "exiting",
            ReplicaState::Terminated => "terminated",
            ReplicaState::Crashed => "crashed",
            ReplicaState::Aborted => "aborted",
        }
    }

    /// Maps a lifecycle event to the state it announces.
    pub fn from_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::ReplicaStarting | EventKind::ReplicaResumed => Some(ReplicaState::Running),
            EventKind::ReplicaPaused => Some(ReplicaState::Paused),
            EventKind::ReplicaExiting => Some(ReplicaState::Exiting),
            EventKind::ReplicaStopped | EventKind::ReplicaFailed => Some(ReplicaState::Terminated),
            EventKind::ReplicaCrashed => Some(ReplicaState::Crashed),
            EventKind::ReplicaAborted => Some(ReplicaState::Aborted),
            _ => None,
        }
    }
}

/// How a replica's entry point returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplicaOutcome {
    Stopped,
    Failed,
}

/// Drives one replica: announces it, awaits the entry point, reports the result.
///
/// Panics are not caught here; the group observes them as a crashed join.
pub(crate) async fn run_replica(id: ReplicaId, work: BoxWorkFuture, bus: Bus) -> ReplicaOutcome {
    let source = id.to_string();
    bus.publish(Event::new(EventKind::ReplicaStarting).with_source(source.clone()));

    match work.await {
        Ok(()) => {
            bus.publish(Event::new(EventKind::ReplicaStopped).with_source(source));
            ReplicaOutcome::Stopped
        }
        Err(e) => {
            tracing::error!(replica = %id, label = e.as_label(), error = %e, "replica terminated early");
            bus.publish(
                Event::new(EventKind::ReplicaFailed)
                    .with_source(source)
                    .with_reason(e.to_string()),
            );
            ReplicaOutcome::Failed
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
