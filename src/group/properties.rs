use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::controller::Controller;
use crate::error::WorkerGroupError;
use crate::queue::BoundedQueue;
use crate::workers::{Worker, WorkerRef};

/// Poll timeout used when none is configured.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// # Validated descriptor of one worker group.
///
/// Bundles the replica count, the entry point, its static arguments, the
/// ordered input/output queues and the shared controller. Fields are private:
/// [`WorkerProperties::create`] is the only way to obtain one, so every
/// descriptor in circulation is valid.
///
/// # Example
/// ```
/// use flightvisor::{BoundedQueue, Controller, WorkError, WorkerContext, WorkerProperties};
///
/// async fn sink(_: (), ctx: WorkerContext<u32, ()>) -> Result<(), WorkError> {
///     while ctx.running().await {
///         let _ = ctx.recv().await;
///     }
///     Ok(())
/// }
///
/// let controller = Controller::new();
/// let q = BoundedQueue::<u32>::new("numbers", 4);
///
/// let ok = WorkerProperties::create("sink", 2, sink, (), vec![q.clone()], vec![], &controller);
/// assert!(ok.is_ok());
///
/// let zero = WorkerProperties::create("sink", 0, sink, (), vec![q], vec![], &controller);
/// assert!(zero.is_err());
/// ```
pub struct WorkerProperties<A, I, O> {
    name: Arc<str>,
    count: usize,
    entry: WorkerRef<A, I, O>,
    args: A,
    inputs: Arc<[BoundedQueue<I>]>,
    outputs: Arc<[BoundedQueue<O>]>,
    controller: Controller,
    poll: Duration,
}

impl<A, I, O> WorkerProperties<A, I, O>
where
    A: Clone + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    /// Validates and builds a descriptor.
    ///
    /// ### Errors
    /// - [`WorkerGroupError::InvalidReplicaCount`] when `count < 1`;
    /// - [`WorkerGroupError::EmptyName`] when `name` is empty;
    /// - [`WorkerGroupError::QueueWiredBothWays`] when one queue is both an
    ///   input and an output of this group.
    pub fn create<W>(
        name: impl Into<Arc<str>>,
        count: usize,
        entry_point: W,
        args: A,
        inputs: Vec<BoundedQueue<I>>,
        outputs: Vec<BoundedQueue<O>>,
        controller: &Controller,
    ) -> Result<Self, WorkerGroupError>
    where
        W: Worker<A, I, O>,
    {
        let name: Arc<str> = name.into();
        if name.is_empty() {
            return Err(WorkerGroupError::EmptyName);
        }
        if count < 1 {
            return Err(WorkerGroupError::InvalidReplicaCount {
                group: name.to_string(),
            });
        }

        let input_ids: HashSet<_> = inputs.iter().map(BoundedQueue::id).collect();
        if let Some(q) = outputs.iter().find(|q| input_ids.contains(&q.id())) {
            return Err(WorkerGroupError::QueueWiredBothWays {
                group: name.to_string(),
                queue: q.name().to_string(),
            });
        }

        Ok(Self {
            name,
            count,
            entry: Arc::new(entry_point),
            args,
            inputs: inputs.into(),
            outputs: outputs.into(),
            controller: controller.clone(),
            poll: DEFAULT_POLL_TIMEOUT,
        })
    }

    /// Overrides the queue poll timeout handed to every replica.
    ///
    /// A zero duration falls back to [`DEFAULT_POLL_TIMEOUT`].
    #[must_use]
    pub fn with_poll_timeout(mut self, poll: Duration) -> Self {
        self.poll = if poll.is_zero() {
            DEFAULT_POLL_TIMEOUT
        } else {
            poll
        };
        self
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of replicas the group will run.
    pub fn replica_count(&self) -> usize {
        self.count
    }

    /// Input queues, in declaration order.
    pub fn inputs(&self) -> &[BoundedQueue<I>] {
        &self.inputs
    }

    /// Output queues, in declaration order.
    pub fn outputs(&self) -> &[BoundedQueue<O>] {
        &self.outputs
    }

    /// Poll timeout handed to every replica.
    pub fn poll_timeout(&self) -> Duration {
        self.poll
    }

    pub(crate) fn into_parts(self) -> PropertiesParts<A, I, O> {
        PropertiesParts {
            name: self.name,
            count: self.count,
            entry: self.entry,
            args: self.args,
            inputs: self.inputs,
            outputs: self.outputs,
            controller: self.controller,
            poll: self.poll,
        }
    }
}

impl<A, I, O> fmt::Debug for WorkerProperties<A, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProperties")
            .field("name", &self.name)
            .field("count", &self.count)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

pub(crate) struct PropertiesParts<A, I, O> {
    pub name: Arc<str>,
    pub count: usize,
    pub entry: WorkerRef<A, I, O>,
    pub args: A,
    pub inputs: Arc<[BoundedQueue<I>]>,
    pub outputs: Arc<[BoundedQueue<O>]>,
    pub controller: Controller,
    pub poll: Duration,
}
