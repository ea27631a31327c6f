//! # Replica lifecycle tracker with sequence-based ordering.
//!
//! Maintains the last known [`ReplicaState`] of every replica, using event
//! sequence numbers to handle out-of-order delivery.
//!
//! ```text
//! replicas ──► Bus ──► orchestrator listener ──► AliveTracker::update()
//!                                                        │
//!                                                        ▼
//!                                       HashMap<String, (last_seq, ReplicaState)>
//! ```
//!
//! ## Rules
//! - Only replica lifecycle events change state (see [`ReplicaState::from_event`])
//! - Events with `seq <= last_seq` are **rejected** (stale)
//! - Reads are **eventually consistent** with the bus

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::Event;
use crate::group::ReplicaState;

#[derive(Debug, Clone, Copy)]
struct Entry {
    last_seq: u64,
    state: ReplicaState,
}

/// Thread-safe tracker of replica states.
pub struct AliveTracker {
    state: RwLock<HashMap<String, Entry>>,
}

impl AliveTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Applies a lifecycle event if it is newer than the last one seen for
    /// the same replica. Returns whether the state changed.
    ///
    /// ```text
    /// update(ReplicaStopped, seq=100)  → Terminated, last_seq=100
    /// update(ReplicaStarting, seq=99)  → rejected (stale)
    /// ```
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(next) = ReplicaState::from_event(ev.kind) else {
            return false;
        };
        let Some(name) = ev.source.as_deref() else {
            return false;
        };

        let mut state = self.state.write().await;
        match state.get_mut(name) {
            Some(entry) if ev.seq <= entry.last_seq => false,
            Some(entry) => {
                entry.last_seq = ev.seq;
                entry.state = next;
                true
            }
            None => {
                state.insert(
                    name.to_string(),
                    Entry {
                        last_seq: ev.seq,
                        state: next,
                    },
                );
                true
            }
        }
    }

    /// Last known state of `replica`.
    pub async fn state_of(&self, replica: &str) -> Option<ReplicaState> {
        self.state.read().await.get(replica).map(|e| e.state)
    }

    /// Sorted names of replicas that have not terminated yet.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, e)| e.state.is_alive())
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort_unstable();
        alive
    }
}

impl Default for AliveTracker {
    fn default() -> Self {
        Self::new()
    }
}
