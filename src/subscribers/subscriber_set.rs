//! # SubscriberSet: per-subscriber event delivery.
//!
//! Every subscriber owns a bounded lane and a task that drains it, so a
//! slow or panicking subscriber never holds up the event listener or the
//! other subscribers.
//!
//! ```text
//! emit(&Event) ──try_send──► lane "log"     ──► task ──► LogWriter::on_event
//!              ──try_send──► lane "metrics" ──► task ──► ...::on_event
//!                   │ full / closed                 │ panic
//!                   ▼                               ▼
//!          SubscriberOverflow (bus)        SubscriberPanicked (bus)
//! ```
//!
//! Events keep their order within one lane; there is no ordering between
//! lanes. Panics are caught with `AssertUnwindSafe`, so a subscriber that
//! panics while holding a lock may leave that lock poisoned or its data
//! half-written.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::events::{Bus, Event};
use crate::group::panic_message;
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Delivers events to every registered subscriber.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    tasks: JoinSet<()>,
    bus: Bus,
}

impl SubscriberSet {
    /// Opens one lane per subscriber and spawns its delivery task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut tasks = JoinSet::new();

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            lanes.push(Lane {
                name: sub.name(),
                tx,
            });
            tasks.spawn(Self::deliver(sub, rx, bus.clone()));
        }

        Self { lanes, tasks, bus }
    }

    async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
        while let Some(ev) = rx.recv().await {
            let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                .catch_unwind()
                .await;
            if let Err(panic) = handled {
                bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*panic)));
            }
        }
    }

    /// True when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: &Event) {
        if self.lanes.is_empty() {
            return;
        }
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Same as [`emit`](Self::emit) for an already shared event.
    ///
    /// A lane that cannot take the event gets a `SubscriberOverflow` on the
    /// bus, except when the event is itself an overflow report.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let overflow_report = event.is_subscriber_overflow();

        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !overflow_report {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes every lane and waits until the buffered events are delivered.
    pub async fn shutdown(self) {
        let Self { lanes, mut tasks, .. } = self;
        drop(lanes);
        while tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().push(ev.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn test_events_reach_subscriber_in_order() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>], bus);

        set.emit(&Event::new(EventKind::ExitRequested));
        set.emit(&Event::new(EventKind::QueueDrained));
        set.shutdown().await;

        assert_eq!(
            *rec.seen.lock(),
            vec![EventKind::ExitRequested, EventKind::QueueDrained]
        );
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicker) as Arc<dyn Subscribe>], bus);

        set.emit(&Event::new(EventKind::ReplicaStarting));
        set.shutdown().await;

        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.source.as_deref(), Some("panicker"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
    }
}
