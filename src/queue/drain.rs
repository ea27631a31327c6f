use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{BoundedQueue, QueueId};

/// Type-erased view of a queue used by the shutdown drain.
///
/// The orchestrator stores one `Arc<dyn Drain>` per registered queue,
/// whatever its item type.
#[async_trait]
pub trait Drain: Send + Sync + 'static {
    /// Queue identity.
    fn id(&self) -> QueueId;

    /// Queue name.
    fn name(&self) -> &str;

    /// Number of buffered entries.
    fn len(&self) -> usize;

    /// True when nothing is buffered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// See [`BoundedQueue::fill_and_drain`].
    async fn fill_and_drain(&self, poll: Duration) -> usize;
}

/// Shared handle to a type-erased queue.
pub type QueueRef = Arc<dyn Drain>;

#[async_trait]
impl<T: Send + 'static> Drain for BoundedQueue<T> {
    fn id(&self) -> QueueId {
        BoundedQueue::id(self)
    }

    fn name(&self) -> &str {
        BoundedQueue::name(self)
    }

    fn len(&self) -> usize {
        BoundedQueue::len(self)
    }

    async fn fill_and_drain(&self, poll: Duration) -> usize {
        BoundedQueue::fill_and_drain(self, poll).await
    }
}
