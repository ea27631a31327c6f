use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// Process-wide counter for queue identities.
static QUEUE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a queue, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(u64);

impl QueueId {
    fn next() -> Self {
        Self(QUEUE_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Buffer entry: a real item, or the shutdown sentinel.
enum Slot<T> {
    Item(T),
    Sentinel,
}

struct Shared<T> {
    id: QueueId,
    name: Arc<str>,
    capacity: Option<usize>,
    buf: Mutex<VecDeque<Slot<T>>>,
    not_empty: Notify,
    not_full: Notify,
}

/// Capacity-limited FIFO shared between replicas.
///
/// Clones refer to the same buffer. The buffer lock is only ever held for a
/// push or a pop, never across an await point, and never together with the
/// lock of another queue.
///
/// ### Invariants
/// - with a capacity `C > 0`, `len() <= C` at every observable instant
///   (the shutdown sentinel counts towards `C`);
/// - items leave in the order they entered.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::time::Duration;
/// use flightvisor::BoundedQueue;
///
/// let q = BoundedQueue::new("telemetry", 1);
/// assert!(q.put(1u32, Duration::from_millis(10)).await);
/// assert!(!q.put(2u32, Duration::from_millis(10)).await); // full
/// assert_eq!(q.get(Duration::from_millis(10)).await, Some(1));
/// assert_eq!(q.get(Duration::from_millis(10)).await, None); // empty marker
/// # }
/// ```
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("len", &self.shared.buf.lock().len())
            .finish()
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// `capacity = 0` → unbounded.
    pub fn new(name: impl Into<Arc<str>>, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: QueueId::next(),
                name: name.into(),
                capacity: (capacity > 0).then_some(capacity),
                buf: Mutex::new(VecDeque::new()),
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    /// Returns the queue identity.
    #[inline]
    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    /// Returns the queue name used in logs and events.
    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the capacity, `None` when unbounded.
    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Number of buffered entries (a pending sentinel included).
    pub fn len(&self) -> usize {
        self.shared.buf.lock().len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.shared.buf.lock().is_empty()
    }

    /// True when a bounded queue has no free slot.
    pub fn is_full(&self) -> bool {
        !self.has_room(self.shared.buf.lock().len())
    }

    /// Enqueues `item` without waiting; hands it back when the queue is full.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut buf = self.shared.buf.lock();
        if !self.has_room(buf.len()) {
            return Err(item);
        }
        buf.push_back(Slot::Item(item));
        drop(buf);
        self.shared.not_empty.notify_waiters();
        Ok(())
    }

    /// Enqueues `item`, waiting up to `timeout` for a free slot.
    ///
    /// Returns `false` only once `timeout` elapsed without space being freed;
    /// the item is dropped in that case.
    pub async fn put(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut item = item;
        loop {
            // Register interest before looking at the buffer so a pop that
            // lands in between still wakes us.
            let notified = self.shared.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_put(item) {
                Ok(()) => return true,
                Err(back) => item = back,
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Dequeues without waiting.
    pub fn try_get(&self) -> Option<T> {
        match self.try_pop() {
            Some(Slot::Item(item)) => Some(item),
            _ => None,
        }
    }

    /// Dequeues, waiting up to `timeout` for an item.
    ///
    /// Returns `None` (the empty marker) on timeout and when the shutdown
    /// sentinel is popped; neither is an error.
    pub async fn get(&self, timeout: Duration) -> Option<T> {
        match self.pop(timeout).await {
            Some(Slot::Item(item)) => Some(item),
            _ => None,
        }
    }

    /// Shutdown helper: unblocks every producer and consumer of this queue.
    ///
    /// Pushes one sentinel (skipped when the queue is full), then pops with
    /// the short `poll` timeout until the queue reports empty twice in a row,
    /// which absorbs an item that was in flight from a producer released by
    /// the first pops. Returns the number of residual items discarded.
    pub async fn fill_and_drain(&self, poll: Duration) -> usize {
        self.try_put_sentinel();

        let mut drained = 0;
        let mut empty_polls = 0;
        while empty_polls < 2 {
            match self.pop(poll).await {
                Some(Slot::Item(_)) => {
                    drained += 1;
                    empty_polls = 0;
                }
                Some(Slot::Sentinel) => empty_polls = 0,
                None => empty_polls += 1,
            }
        }
        drained
    }

    fn try_put_sentinel(&self) -> bool {
        let mut buf = self.shared.buf.lock();
        if !self.has_room(buf.len()) {
            return false;
        }
        buf.push_back(Slot::Sentinel);
        drop(buf);
        self.shared.not_empty.notify_waiters();
        true
    }

    fn try_pop(&self) -> Option<Slot<T>> {
        let slot = self.shared.buf.lock().pop_front();
        if slot.is_some() {
            self.shared.not_full.notify_waiters();
        }
        slot
    }

    async fn pop(&self, timeout: Duration) -> Option<Slot<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.shared.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(slot) = self.try_pop() {
                return Some(slot);
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    #[inline]
    fn has_room(&self, len: usize) -> bool {
        self.shared.capacity.is_none_or(|cap| len < cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_put_on_full_queue_fails_after_timeout() {
        let q = BoundedQueue::new("q", 2);
        assert!(q.put(1, POLL).await);
        assert!(q.put(2, POLL).await);

        let started = Instant::now();
        assert!(!q.put(3, Duration::from_secs(1)).await);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(q.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_succeeds_when_space_is_freed() {
        let q = BoundedQueue::new("q", 1);
        assert!(q.put(1, POLL).await);

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.put(2, Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(q.try_get(), Some(1));

        assert!(producer.await.unwrap());
        assert_eq!(q.try_get(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_on_empty_queue_returns_empty_marker() {
        let q: BoundedQueue<u8> = BoundedQueue::new("q", 3);
        let started = Instant::now();
        assert_eq!(q.get(POLL).await, None);
        assert!(started.elapsed() >= POLL);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let q = BoundedQueue::new("q", 0);
        for i in 0..5 {
            q.try_put(i).unwrap();
        }
        let mut out = Vec::new();
        while let Some(i) = q.try_get() {
            out.push(i);
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unbounded_never_full() {
        let q = BoundedQueue::new("q", 0);
        for i in 0..10_000 {
            assert!(q.try_put(i).is_ok());
        }
        assert_eq!(q.capacity(), None);
        assert!(!q.is_full());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_never_exceeded_under_contention() {
        let q = BoundedQueue::new("q", 3);
        let mut producers = Vec::new();
        for p in 0..8 {
            let q = q.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..20 {
                    let _ = q.put(p * 100 + i, Duration::from_millis(5)).await;
                    assert!(q.len() <= 3);
                }
            }));
        }
        for _ in 0..100 {
            assert!(q.len() <= 3);
            let _ = q.get(Duration::from_millis(1)).await;
        }
        for p in producers {
            p.await.unwrap();
        }
        assert!(q.len() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_wakes_blocked_consumer_with_empty_marker() {
        let q: BoundedQueue<u32> = BoundedQueue::new("q", 2);
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.get(Duration::from_secs(3600)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(q.try_put_sentinel());
        assert_eq!(consumer.await.unwrap(), None);
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_and_drain_releases_blocked_producer() {
        let q = BoundedQueue::new("q", 2);
        q.try_put(1).unwrap();
        q.try_put(2).unwrap();

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.put(3, Duration::from_secs(3600)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let drained = q.fill_and_drain(POLL).await;
        assert!(producer.await.unwrap(), "producer must get its slot");
        assert_eq!(drained, 3);
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_and_drain_on_empty_queue_leaves_it_empty() {
        let q: BoundedQueue<u8> = BoundedQueue::new("q", 1);
        assert_eq!(q.fill_and_drain(POLL).await, 0);
        assert!(q.is_empty());
    }

    #[test]
    fn test_clones_share_identity() {
        let a: BoundedQueue<u8> = BoundedQueue::new("a", 1);
        let b = BoundedQueue::<u8>::new("b", 1);
        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), b.id());
    }
}
