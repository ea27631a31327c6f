use std::sync::Arc;
use std::time::Duration;

use crate::controller::Controller;
use crate::events::{Bus, Event, EventKind};
use crate::group::ReplicaId;
use crate::queue::BoundedQueue;

/// Put attempts per output queue before an item is dropped.
pub const SEND_ATTEMPTS: usize = 3;

/// Everything one replica needs to run the cooperative loop.
///
/// Built by the group manager for each replica; the queues and controller
/// are shared with every other replica of the pipeline.
pub struct WorkerContext<I, O> {
    replica: ReplicaId,
    controller: Controller,
    inputs: Arc<[BoundedQueue<I>]>,
    outputs: Arc<[BoundedQueue<O>]>,
    poll: Duration,
    bus: Bus,
}

impl<I: Send + 'static, O: Send + 'static> WorkerContext<I, O> {
    pub(crate) fn new(
        replica: ReplicaId,
        controller: Controller,
        inputs: Arc<[BoundedQueue<I>]>,
        outputs: Arc<[BoundedQueue<O>]>,
        poll: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            replica,
            controller,
            inputs,
            outputs,
            poll,
            bus,
        }
    }

    /// Identity of this replica (`group#index`).
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Shared controller.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Input queues, in declaration order.
    pub fn inputs(&self) -> &[BoundedQueue<I>] {
        &self.inputs
    }

    /// Output queues, in declaration order.
    pub fn outputs(&self) -> &[BoundedQueue<O>] {
        &self.outputs
    }

    /// Short timeout used for every queue operation.
    #[inline]
    pub fn poll_timeout(&self) -> Duration {
        self.poll
    }

    /// Loop guard: exit check followed by `check_pause`.
    ///
    /// Returns `false` once exit is requested, including when exit arrives
    /// while the replica is parked on the pause flag; a paused replica never
    /// resumes work after that.
    pub async fn running(&self) -> bool {
        if self.controller.is_exit_requested() {
            self.publish(EventKind::ReplicaExiting);
            return false;
        }
        if self.controller.is_paused() {
            self.publish(EventKind::ReplicaPaused);
            self.controller.check_pause().await;
            if self.controller.is_exit_requested() {
                self.publish(EventKind::ReplicaExiting);
                return false;
            }
            self.publish(EventKind::ReplicaResumed);
        }
        true
    }

    /// Short-timeout get across the inputs; `None` when nothing arrived.
    ///
    /// A replica without inputs just waits one poll period.
    pub async fn recv(&self) -> Option<I> {
        match &self.inputs[..] {
            [] => {
                tokio::time::sleep(self.poll).await;
                None
            }
            [only] => only.get(self.poll).await,
            many => {
                if let Some(item) = many.iter().find_map(BoundedQueue::try_get) {
                    return Some(item);
                }
                let slice = (self.poll / many.len() as u32).max(Duration::from_millis(1));
                for q in many {
                    if let Some(item) = q.get(slice).await {
                        return Some(item);
                    }
                }
                None
            }
        }
    }

    /// Puts `item` on every output queue.
    ///
    /// Each queue gets up to [`SEND_ATTEMPTS`] bounded puts; attempts stop
    /// early once exit is requested. An item that could not be delivered is
    /// dropped, logged, and reported as `ItemDropped`. Returns whether every
    /// output accepted it.
    pub async fn send(&self, item: O) -> bool
    where
        O: Clone,
    {
        let mut delivered = true;
        for q in self.outputs.iter() {
            if self.put_with_retry(q, &item).await {
                continue;
            }
            delivered = false;
            tracing::warn!(replica = %self.replica, queue = q.name(), "output full, item dropped");
            self.bus.publish(
                Event::new(EventKind::ItemDropped)
                    .with_source(self.replica.to_string())
                    .with_queue(q.name()),
            );
        }
        delivered
    }

    async fn put_with_retry(&self, q: &BoundedQueue<O>, item: &O) -> bool
    where
        O: Clone,
    {
        for _ in 0..SEND_ATTEMPTS {
            if q.put(item.clone(), self.poll).await {
                return true;
            }
            if self.controller.is_exit_requested() {
                break;
            }
        }
        false
    }

    fn publish(&self, kind: EventKind) {
        self.bus
            .publish(Event::new(kind).with_source(self.replica.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn ctx(
        inputs: Vec<BoundedQueue<u32>>,
        outputs: Vec<BoundedQueue<u32>>,
        controller: &Controller,
        bus: &Bus,
    ) -> WorkerContext<u32, u32> {
        WorkerContext::new(
            ReplicaId::new("test", 0),
            controller.clone(),
            inputs.into(),
            outputs.into(),
            Duration::from_millis(100),
            bus.clone(),
        )
    }

    #[tokio::test]
    async fn test_running_is_false_after_exit() {
        let c = Controller::new();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let ctx = ctx(vec![], vec![], &c, &bus);

        assert!(ctx.running().await);
        c.request_exit();
        assert!(!ctx.running().await);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ReplicaExiting);
        assert_eq!(ev.source.as_deref(), Some("test#0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_while_paused_never_resumes() {
        let c = Controller::new();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let ctx = ctx(vec![], vec![], &c, &bus);
        c.request_pause();

        let guard = tokio::spawn(async move { ctx.running().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        c.request_exit();
        assert!(!guard.await.unwrap());

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok().map(|e| e.kind)).collect();
        assert_eq!(kinds, vec![EventKind::ReplicaPaused, EventKind::ReplicaExiting]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_reads_any_input() {
        let c = Controller::new();
        let bus = Bus::new(8);
        let a = BoundedQueue::new("a", 1);
        let b = BoundedQueue::new("b", 1);
        let ctx = ctx(vec![a.clone(), b.clone()], vec![], &c, &bus);

        b.try_put(7).unwrap();
        assert_eq!(ctx.recv().await, Some(7));

        let started = Instant::now();
        assert_eq!(ctx.recv().await, None);
        assert!(started.elapsed() <= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_drops_after_bounded_attempts() {
        let c = Controller::new();
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let out = BoundedQueue::new("out", 1);
        out.try_put(1).unwrap();
        let ctx = ctx(vec![], vec![out.clone()], &c, &bus);

        let started = Instant::now();
        assert!(!ctx.send(2).await);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(out.len(), 1);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ItemDropped);
        assert_eq!(ev.queue.as_deref(), Some("out"));
    }

    #[tokio::test]
    async fn test_send_fans_out_to_every_output() {
        let c = Controller::new();
        let bus = Bus::new(8);
        let x = BoundedQueue::new("x", 2);
        let y = BoundedQueue::new("y", 2);
        let ctx = ctx(vec![], vec![x.clone(), y.clone()], &c, &bus);

        assert!(ctx.send(5).await);
        assert_eq!(x.try_get(), Some(5));
        assert_eq!(y.try_get(), Some(5));
    }
}
