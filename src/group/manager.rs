use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{self, Instant};

use crate::error::WorkerGroupError;
use crate::events::{Bus, Event, EventKind};
use crate::group::WorkerProperties;
use crate::group::replica::{ReplicaId, ReplicaOutcome, panic_message, run_replica};
use crate::queue::QueueRef;
use crate::workers::WorkerContext;

type ReplicaFuture = Pin<Box<dyn Future<Output = ReplicaOutcome> + Send + 'static>>;
type MakeReplica = Box<dyn Fn(ReplicaId) -> ReplicaFuture + Send + Sync>;

/// Lifecycle of a worker group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Replicas described but not spawned.
    Created,
    /// Replicas spawned.
    Started,
    /// Every replica terminated and was joined; the group cannot be reused.
    Joined,
}

/// Outcome of joining a group (or every group of a pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Replicas whose entry point returned `Ok`.
    pub stopped: usize,
    /// Replicas whose entry point returned an error.
    pub failed: usize,
    /// Replicas that panicked.
    pub crashed: usize,
    /// Replicas aborted because the join grace ran out (sorted).
    pub stuck: Vec<String>,
}

impl JoinReport {
    /// Number of replicas accounted for.
    pub fn total(&self) -> usize {
        self.stopped + self.failed + self.crashed + self.stuck.len()
    }

    /// True when every replica returned `Ok`.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.crashed == 0 && self.stuck.is_empty()
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: JoinReport) {
        self.stopped += other.stopped;
        self.failed += other.failed;
        self.crashed += other.crashed;
        self.stuck.extend(other.stuck);
        self.stuck.sort_unstable();
    }
}

/// # Running worker group.
///
/// Owns the replicas of one group exclusively. Generic over nothing: the
/// descriptor's argument and item types are captured inside the replica
/// factory so an orchestrator can keep heterogeneous groups in one list.
///
/// ```text
/// Created ──start_workers()──► Started ──join_workers()──► Joined
/// ```
///
/// Crashed replicas are logged and counted, never restarted.
pub struct WorkerManager {
    name: Arc<str>,
    count: usize,
    inputs: Vec<QueueRef>,
    outputs: Vec<QueueRef>,
    make_replica: MakeReplica,
    handle: Handle,
    bus: Bus,
    state: GroupState,
    set: JoinSet<ReplicaOutcome>,
    ids: HashMap<task::Id, ReplicaId>,
}

impl WorkerManager {
    /// Creates the manager for a validated descriptor.
    ///
    /// Holds `replica_count` replicas, none of them started.
    ///
    /// ### Errors
    /// [`WorkerGroupError::NoRuntime`] when called outside a tokio runtime.
    pub fn create<A, I, O>(
        props: WorkerProperties<A, I, O>,
        bus: &Bus,
    ) -> Result<Self, WorkerGroupError>
    where
        A: Clone + Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
    {
        let parts = props.into_parts();
        let handle = Handle::try_current().map_err(|_| WorkerGroupError::NoRuntime {
            group: parts.name.to_string(),
        })?;

        let inputs = parts
            .inputs
            .iter()
            .map(|q| Arc::new(q.clone()) as QueueRef)
            .collect();
        let outputs = parts
            .outputs
            .iter()
            .map(|q| Arc::new(q.clone()) as QueueRef)
            .collect();

        let replica_bus = bus.clone();
        let make_replica: MakeReplica = Box::new(move |id: ReplicaId| -> ReplicaFuture {
            let ctx = WorkerContext::new(
                id.clone(),
                parts.controller.clone(),
                Arc::clone(&parts.inputs),
                Arc::clone(&parts.outputs),
                parts.poll,
                replica_bus.clone(),
            );
            let work = parts.entry.spawn(parts.args.clone(), ctx);
            Box::pin(run_replica(id, work, replica_bus.clone()))
        });

        Ok(Self {
            name: parts.name,
            count: parts.count,
            inputs,
            outputs,
            make_replica,
            handle,
            bus: bus.clone(),
            state: GroupState::Created,
            set: JoinSet::new(),
            ids: HashMap::new(),
        })
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of replicas this group runs.
    pub fn replica_count(&self) -> usize {
        self.count
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Type-erased input queues (for the drain plan).
    pub fn inputs(&self) -> &[QueueRef] {
        &self.inputs
    }

    /// Type-erased output queues (for the drain plan).
    pub fn outputs(&self) -> &[QueueRef] {
        &self.outputs
    }

    /// Spawns every replica.
    ///
    /// A second call on a started group is a logged no-op.
    ///
    /// ### Errors
    /// [`WorkerGroupError::AlreadyJoined`] when the group was already joined.
    pub fn start_workers(&mut self) -> Result<(), WorkerGroupError> {
        match self.state {
            GroupState::Started => {
                tracing::warn!(group = %self.name, "start_workers called twice; ignored");
                return Ok(());
            }
            GroupState::Joined => {
                return Err(WorkerGroupError::AlreadyJoined {
                    group: self.name.to_string(),
                });
            }
            GroupState::Created => {}
        }

        for index in 0..self.count {
            let id = ReplicaId::new(Arc::clone(&self.name), index);
            let fut = (self.make_replica)(id.clone());
            let abort = self.set.spawn_on(fut, &self.handle);
            self.ids.insert(abort.id(), id);
        }
        self.state = GroupState::Started;

        tracing::debug!(group = %self.name, replicas = self.count, "group started");
        self.bus.publish(
            Event::new(EventKind::GroupStarted)
                .with_source(Arc::clone(&self.name))
                .with_count(self.count),
        );
        Ok(())
    }

    /// Waits until every replica terminated.
    ///
    /// Calling this before exit was requested and the group's downstream
    /// queues were drained may wait forever; sequencing is the caller's job.
    pub async fn join_workers(&mut self) -> JoinReport {
        let mut report = JoinReport::default();
        while let Some(res) = self.set.join_next_with_id().await {
            self.record(res, &mut report);
        }
        self.finish();
        report
    }

    /// Like [`join_workers`](Self::join_workers), but aborts the replicas
    /// still running once `grace` elapsed and lists them in `stuck`.
    pub async fn join_workers_within(&mut self, grace: Duration) -> JoinReport {
        let mut report = self.join_workers_until(Instant::now() + grace).await;
        if self.state == GroupState::Started {
            report.merge(self.abort_pending().await);
        }
        report
    }

    /// Joins replicas as they terminate until `deadline`.
    ///
    /// Replicas still running at the deadline are left alone; the group only
    /// becomes [`GroupState::Joined`] once none is left.
    pub async fn join_workers_until(&mut self, deadline: Instant) -> JoinReport {
        let mut report = JoinReport::default();
        while let Ok(Some(res)) = time::timeout_at(deadline, self.set.join_next_with_id()).await {
            self.record(res, &mut report);
        }
        if self.set.is_empty() {
            self.finish();
        }
        report
    }

    /// Sorted ids of the replicas spawned but not joined yet.
    pub fn pending(&self) -> Vec<String> {
        let mut pending: Vec<String> = self.ids.values().map(ToString::to_string).collect();
        pending.sort_unstable();
        pending
    }

    /// Aborts the replicas still running and joins them.
    ///
    /// Each aborted replica is listed in `stuck` and announced with
    /// [`EventKind::ReplicaAborted`].
    pub async fn abort_pending(&mut self) -> JoinReport {
        let mut report = JoinReport::default();
        self.set.abort_all();
        while let Some(res) = self.set.join_next_with_id().await {
            self.record(res, &mut report);
        }
        report.stuck.sort_unstable();
        self.finish();
        report
    }

    fn record(
        &mut self,
        res: Result<(task::Id, ReplicaOutcome), JoinError>,
        report: &mut JoinReport,
    ) {
        match res {
            Ok((id, outcome)) => {
                self.ids.remove(&id);
                match outcome {
                    ReplicaOutcome::Stopped => report.stopped += 1,
                    ReplicaOutcome::Failed => report.failed += 1,
                }
            }
            Err(err) => {
                let replica = self
                    .ids
                    .remove(&err.id())
                    .map_or_else(|| format!("{}#?", self.name), |r| r.to_string());

                if err.is_panic() {
                    let reason = panic_message(&*err.into_panic());
                    tracing::error!(replica = %replica, reason = %reason, "replica crashed");
                    self.bus.publish(
                        Event::new(EventKind::ReplicaCrashed)
                            .with_source(replica)
                            .with_reason(reason),
                    );
                    report.crashed += 1;
                } else {
                    tracing::warn!(replica = %replica, "replica aborted after grace");
                    self.bus
                        .publish(Event::new(EventKind::ReplicaAborted).with_source(replica.clone()));
                    report.stuck.push(replica);
                }
            }
        }
    }

    fn finish(&mut self) {
        if self.state == GroupState::Started {
            self.state = GroupState::Joined;
            self.bus.publish(
                Event::new(EventKind::GroupJoined)
                    .with_source(Arc::clone(&self.name))
                    .with_count(self.count),
            );
        }
    }
}

impl fmt::Debug for WorkerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerManager")
            .field("name", &self.name)
            .field("count", &self.count)
            .field("state", &self.state)
            .field("inputs", &self.inputs.iter().map(|q| q.name()).collect::<Vec<_>>())
            .field("outputs", &self.outputs.iter().map(|q| q.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::error::WorkError;
    use crate::queue::BoundedQueue;

    async fn idle(_: (), ctx: WorkerContext<(), ()>) -> Result<(), WorkError> {
        while ctx.running().await {
            let _ = ctx.recv().await;
        }
        Ok(())
    }

    async fn counter(n: u32, ctx: WorkerContext<(), u32>) -> Result<(), WorkError> {
        while ctx.running().await {
            ctx.send(n).await;
        }
        Ok(())
    }

    async fn crasher(_: (), _ctx: WorkerContext<(), ()>) -> Result<(), WorkError> {
        panic!("boom");
    }

    async fn stubborn(_: (), _ctx: WorkerContext<(), ()>) -> Result<(), WorkError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    #[test]
    fn test_create_outside_runtime_fails() {
        let c = Controller::new();
        let props = WorkerProperties::create("idle", 1, idle, (), vec![], vec![], &c).unwrap();
        let err = WorkerManager::create(props, &Bus::new(4)).unwrap_err();
        assert_eq!(err.as_label(), "group_no_runtime");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_join_all_replicas() {
        let c = Controller::new();
        let bus = Bus::new(64);
        let props = WorkerProperties::create("idle", 4, idle, (), vec![], vec![], &c).unwrap();
        let mut m = WorkerManager::create(props, &bus).unwrap();
        assert_eq!(m.state(), GroupState::Created);

        m.start_workers().unwrap();
        m.start_workers().unwrap();
        assert_eq!(m.state(), GroupState::Started);

        tokio::time::sleep(Duration::from_millis(250)).await;
        c.request_exit();

        let report = m.join_workers().await;
        assert_eq!(report.stopped, 4);
        assert!(report.is_clean());
        assert_eq!(m.state(), GroupState::Joined);
        assert_eq!(
            m.start_workers().unwrap_err(),
            WorkerGroupError::AlreadyJoined {
                group: "idle".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_replicas_get_their_own_args() {
        let c = Controller::new();
        let bus = Bus::new(64);
        let out = BoundedQueue::new("out", 1);
        let props =
            WorkerProperties::create("counter", 1, counter, 9, vec![], vec![out.clone()], &c)
                .unwrap();
        let mut m = WorkerManager::create(props, &bus).unwrap();
        m.start_workers().unwrap();

        assert_eq!(out.get(Duration::from_secs(1)).await, Some(9));
        c.request_exit();
        out.fill_and_drain(Duration::from_millis(100)).await;
        assert_eq!(m.join_workers().await.stopped, 1);
    }

    #[tokio::test]
    async fn test_crash_is_reported_not_retried() {
        let c = Controller::new();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let props = WorkerProperties::create("crasher", 2, crasher, (), vec![], vec![], &c).unwrap();
        let mut m = WorkerManager::create(props, &bus).unwrap();
        m.start_workers().unwrap();

        let report = m.join_workers().await;
        assert_eq!(report.crashed, 2);
        assert_eq!(report.total(), 2);

        let mut crashed = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ReplicaCrashed {
                assert_eq!(ev.reason.as_deref(), Some("boom"));
                crashed.push(ev.source.unwrap().to_string());
            }
        }
        crashed.sort();
        assert_eq!(crashed, ["crasher#0", "crasher#1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_within_grace_aborts_stuck_replicas() {
        let c = Controller::new();
        let bus = Bus::new(64);
        let props =
            WorkerProperties::create("stubborn", 2, stubborn, (), vec![], vec![], &c).unwrap();
        let mut m = WorkerManager::create(props, &bus).unwrap();
        m.start_workers().unwrap();
        c.request_exit();

        let report = m.join_workers_within(Duration::from_secs(1)).await;
        assert_eq!(report.stuck, ["stubborn#0", "stubborn#1"]);
        assert!(!report.is_clean());
        assert_eq!(m.state(), GroupState::Joined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_until_leaves_pending_replicas_for_abort() {
        let c = Controller::new();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let props =
            WorkerProperties::create("stubborn", 2, stubborn, (), vec![], vec![], &c).unwrap();
        let mut m = WorkerManager::create(props, &bus).unwrap();
        m.start_workers().unwrap();

        let report = m
            .join_workers_until(Instant::now() + Duration::from_secs(1))
            .await;
        assert_eq!(report.total(), 0);
        assert_eq!(m.state(), GroupState::Started);
        assert_eq!(m.pending(), ["stubborn#0", "stubborn#1"]);

        let report = m.abort_pending().await;
        assert_eq!(report.stuck, ["stubborn#0", "stubborn#1"]);
        assert!(m.pending().is_empty());
        assert_eq!(m.state(), GroupState::Joined);

        let mut aborted = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ReplicaAborted {
                aborted.push(ev.source.unwrap().to_string());
            }
        }
        aborted.sort();
        assert_eq!(aborted, ["stubborn#0", "stubborn#1"]);
    }

    #[test]
    fn test_report_merge() {
        let mut a = JoinReport {
            stopped: 1,
            stuck: vec!["b#0".into()],
            ..JoinReport::default()
        };
        a.merge(JoinReport {
            crashed: 1,
            stuck: vec!["a#0".into()],
            ..JoinReport::default()
        });
        assert_eq!(a.total(), 4);
        assert_eq!(a.stuck, ["a#0", "b#0"]);
    }
}
