//! # Orchestrator: wires groups, runs the pipeline, drives the shutdown drain.
//!
//! The [`Orchestrator`] owns the queues it created, the worker groups, the
//! event bus and the shared [`Controller`]. Its shutdown is the one sequence
//! that is guaranteed not to deadlock on bounded queues:
//!
//! ```text
//! shutdown():
//!   1. controller.request_exit()           → replicas see it at their next poll point
//!   2. for q in DrainPlan (end to start):  → q.fill_and_drain(poll)
//!        unblocks producers stuck in put(q) and consumers stuck in get(q)
//!   3. join every group (within grace)     → JoinReport
//!   4. AllStoppedWithin | GraceExceeded
//! ```
//!
//! Joining before step 2 is what deadlocks: a producer blocked in `put` on a
//! full queue never reaches its exit check.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use flightvisor::{Orchestrator, OrchestratorConfig, WorkError, WorkerContext, WorkerProperties};
//!
//! async fn ticker(_: (), ctx: WorkerContext<(), u64>) -> Result<(), WorkError> {
//!     let mut n = 0;
//!     while ctx.running().await {
//!         n += 1;
//!         ctx.send(n).await;
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut orch = Orchestrator::builder(OrchestratorConfig::default()).build()?;
//!     let ticks = orch.queue::<u64>("ticks", 2);
//!
//!     let props = WorkerProperties::create("ticker", 2, ticker, (), vec![], vec![ticks.clone()], orch.controller())?;
//!     orch.add_group(props)?;
//!
//!     let report = orch
//!         .run(|_| async move {
//!             for _ in 0..5 {
//!                 let _ = ticks.get(Duration::from_millis(100)).await;
//!             }
//!         })
//!         .await?;
//!     assert_eq!(report.joined.stopped, 2);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{
    alive::AliveTracker, builder::OrchestratorBuilder, config::OrchestratorConfig,
    pipeline::DrainPlan, shutdown,
};
use crate::controller::Controller;
use crate::error::{PipelineError, RuntimeError, WorkerGroupError};
use crate::events::{Bus, Event, EventKind};
use crate::group::{JoinReport, WorkerManager, WorkerProperties};
use crate::queue::{BoundedQueue, QueueRef};

/// Outcome of a completed shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// `(queue, residual items discarded)` in drain order.
    pub drained: Vec<(String, usize)>,
    /// Join outcome across every group.
    pub joined: JoinReport,
}

/// Composition root of a pipeline.
pub struct Orchestrator {
    cfg: OrchestratorConfig,
    controller: Controller,
    bus: Bus,
    alive: Arc<AliveTracker>,
    queues: Vec<QueueRef>,
    groups: Vec<WorkerManager>,
    listener: CancellationToken,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder(cfg: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: OrchestratorConfig,
        controller: Controller,
        bus: Bus,
        alive: Arc<AliveTracker>,
        listener: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            controller,
            bus,
            alive,
            queues: Vec::new(),
            groups: Vec::new(),
            listener,
        }
    }

    /// Shared controller; pass it to [`WorkerProperties::create`].
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Event bus shared with every group.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Last known replica states.
    pub fn alive(&self) -> &Arc<AliveTracker> {
        &self.alive
    }

    /// Orchestrator settings.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.cfg
    }

    /// Creates a queue and registers it for the shutdown drain.
    ///
    /// `capacity = 0` → unbounded.
    pub fn queue<T: Send + 'static>(&mut self, name: &str, capacity: usize) -> BoundedQueue<T> {
        let q = BoundedQueue::new(name, capacity);
        self.queues.push(Arc::new(q.clone()));
        q
    }

    /// Creates the manager for `props` and adds it to the pipeline.
    ///
    /// ### Errors
    /// - [`WorkerGroupError::DuplicateGroup`] when a group with the same name exists;
    /// - any error of [`WorkerManager::create`].
    pub fn add_group<A, I, O>(&mut self, props: WorkerProperties<A, I, O>) -> Result<(), RuntimeError>
    where
        A: Clone + Send + Sync + 'static,
        I: Send + 'static,
        O: Send + 'static,
    {
        if self.groups.iter().any(|g| g.name() == props.name()) {
            return Err(WorkerGroupError::DuplicateGroup {
                group: props.name().to_string(),
            }
            .into());
        }
        let manager = WorkerManager::create(props, &self.bus)?;
        self.groups.push(manager);
        Ok(())
    }

    /// Registered groups, in insertion order.
    pub fn groups(&self) -> &[WorkerManager] {
        &self.groups
    }

    /// Order in which [`shutdown`](Self::shutdown) will drain the queues.
    pub fn drain_plan(&self) -> Result<DrainPlan, PipelineError> {
        DrainPlan::build(&self.queues, self.groups.iter().map(WorkerManager::wiring))
    }

    /// Starts every group.
    ///
    /// The wiring is validated first, so a cyclic pipeline fails before any
    /// replica is spawned.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        let plan = self.drain_plan()?;
        tracing::debug!(drain_order = ?plan, groups = self.groups.len(), "starting pipeline");

        for group in &mut self.groups {
            group.start_workers()?;
        }
        Ok(())
    }

    /// Starts the pipeline, runs `main` until it returns or a termination
    /// signal arrives, then shuts down.
    ///
    /// `main` receives a clone of the controller (to pause/resume or to end
    /// the run early by requesting exit itself).
    pub async fn run<F, Fut>(&mut self, main: F) -> Result<ShutdownReport, RuntimeError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.start()?;

        let signal = async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for termination signals");
                    std::future::pending().await
                }
            }
        };

        tokio::select! {
            _ = main(self.controller.clone()) => {}
            sig = signal => {
                tracing::info!(signal = %sig, "termination signal received");
                self.bus.publish(
                    Event::new(EventKind::ShutdownRequested).with_reason(sig.to_string()),
                );
            }
        }
        self.shutdown().await
    }

    /// Requests exit, drains every queue end to start, then joins every group.
    ///
    /// The exit flag stays set; call [`Controller::clear_exit`] to reuse the
    /// controller.
    ///
    /// ### Errors
    /// - [`RuntimeError::Pipeline`] when the wiring is cyclic (nothing is
    ///   drained or joined then);
    /// - [`RuntimeError::GraceExceeded`] when replicas had to be aborted.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport, RuntimeError> {
        let plan = self.drain_plan()?;

        self.controller.request_exit();
        self.bus.publish(Event::new(EventKind::ExitRequested));
        tracing::info!(drain_order = ?plan, "exit requested, draining queues");

        let poll = self.cfg.drain_poll();
        let mut drained = Vec::with_capacity(plan.len());
        for q in plan.queues() {
            let n = q.fill_and_drain(poll).await;
            self.bus.publish(
                Event::new(EventKind::QueueDrained)
                    .with_queue(q.name())
                    .with_count(n),
            );
            drained.push((q.name().to_string(), n));
        }

        let joined = self.join_all().await;

        if !joined.stuck.is_empty() {
            return Err(RuntimeError::GraceExceeded {
                grace: self.cfg.grace,
                stuck: joined.stuck,
            });
        }

        self.bus
            .publish(Event::new(EventKind::AllStoppedWithin).with_count(joined.total()));
        Ok(ShutdownReport { drained, joined })
    }

    /// Joins every group, sharing one grace deadline between them.
    ///
    /// Replicas still running at the deadline are reported with their last
    /// known state, then aborted.
    async fn join_all(&mut self) -> JoinReport {
        let mut report = JoinReport::default();
        let Some(grace) = self.cfg.join_grace() else {
            for group in &mut self.groups {
                report.merge(group.join_workers().await);
            }
            return report;
        };

        let deadline = Instant::now() + grace;
        for group in &mut self.groups {
            report.merge(group.join_workers_until(deadline).await);
        }

        let pending: Vec<String> = self.groups.iter().flat_map(WorkerManager::pending).collect();
        if pending.is_empty() {
            return report;
        }

        let stuck = self.last_states(&pending).await;
        self.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_reason(stuck)
                .with_timeout(grace),
        );
        for group in &mut self.groups {
            report.merge(group.abort_pending().await);
        }
        report
    }

    /// Renders `replica=state` for every pending replica, using the alive
    /// tracker's view.
    async fn last_states(&self, pending: &[String]) -> String {
        let alive = self.alive.snapshot().await;
        let mut entries = Vec::with_capacity(pending.len());
        for replica in pending {
            let state = self
                .alive
                .state_of(replica)
                .await
                .map_or("unknown", |s| s.as_label());
            if !alive.contains(replica) {
                tracing::debug!(replica = %replica, state, "alive tracker lags behind join");
            }
            tracing::warn!(replica = %replica, last_state = state, "replica still running after grace");
            entries.push(format!("{replica}={state}"));
        }
        entries.join(",")
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkError;
    use crate::workers::WorkerContext;
    use std::time::Duration;

    async fn producer(_: (), ctx: WorkerContext<(), u32>) -> Result<(), WorkError> {
        while ctx.running().await {
            ctx.send(1).await;
        }
        Ok(())
    }

    async fn relay(_: (), ctx: WorkerContext<u32, u32>) -> Result<(), WorkError> {
        while ctx.running().await {
            let Some(x) = ctx.recv().await else { continue };
            ctx.send(x + 1).await;
        }
        Ok(())
    }

    async fn stubborn(_: (), _ctx: WorkerContext<(), ()>) -> Result<(), WorkError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let err = Orchestrator::builder(OrchestratorConfig::default())
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "runtime_missing");
    }

    #[tokio::test]
    async fn test_duplicate_group_rejected() {
        let mut orch = Orchestrator::builder(OrchestratorConfig::default())
            .build()
            .unwrap();
        let q = orch.queue::<u32>("q", 1);
        let c = orch.controller().clone();
        let p1 = WorkerProperties::create("p", 1, producer, (), vec![], vec![q.clone()], &c).unwrap();
        let p2 = WorkerProperties::create("p", 1, producer, (), vec![], vec![q], &c).unwrap();

        orch.add_group(p1).unwrap();
        let err = orch.add_group(p2).unwrap_err();
        assert_eq!(err.as_label(), "group_duplicate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_full_chain() {
        let mut orch = Orchestrator::builder(OrchestratorConfig::default())
            .build()
            .unwrap();
        let a = orch.queue::<u32>("a", 1);
        let b = orch.queue::<u32>("b", 1);
        let c = orch.controller().clone();

        orch.add_group(
            WorkerProperties::create("producer", 3, producer, (), vec![], vec![a.clone()], &c)
                .unwrap(),
        )
        .unwrap();
        orch.add_group(
            WorkerProperties::create("relay", 2, relay, (), vec![a], vec![b], &c).unwrap(),
        )
        .unwrap();

        assert_eq!(orch.drain_plan().unwrap().queue_names(), ["b", "a"]);

        orch.start().unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let report = orch.shutdown().await.unwrap();
        assert_eq!(report.joined.stopped, 5);
        assert!(report.joined.is_clean());
        assert_eq!(
            report.drained.iter().map(|(q, _)| q.as_str()).collect::<Vec<_>>(),
            ["b", "a"]
        );
        assert!(c.is_exit_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cyclic_pipeline_fails_before_start() {
        let mut orch = Orchestrator::builder(OrchestratorConfig::default())
            .build()
            .unwrap();
        let x = orch.queue::<u32>("x", 1);
        let y = orch.queue::<u32>("y", 1);
        let c = orch.controller().clone();
        orch.add_group(
            WorkerProperties::create("a", 1, relay, (), vec![x.clone()], vec![y.clone()], &c)
                .unwrap(),
        )
        .unwrap();
        orch.add_group(WorkerProperties::create("b", 1, relay, (), vec![y], vec![x], &c).unwrap())
            .unwrap();

        let err = orch.start().unwrap_err();
        assert_eq!(err.as_label(), "runtime_pipeline_rejected");
        assert!(err.is_setup());
        assert!(
            orch.groups()
                .iter()
                .all(|g| g.state() == crate::group::GroupState::Created)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_replicas_are_not_left_alive() {
        let cfg = OrchestratorConfig {
            grace: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        };
        let mut orch = Orchestrator::builder(cfg).build().unwrap();
        let c = orch.controller().clone();
        orch.add_group(
            WorkerProperties::create("stubborn", 2, stubborn, (), vec![], vec![], &c).unwrap(),
        )
        .unwrap();
        let mut rx = orch.bus().subscribe();

        orch.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.alive().snapshot().await, ["stubborn#0", "stubborn#1"]);

        match orch.shutdown().await {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, ["stubborn#0", "stubborn#1"]);
            }
            other => panic!("expected grace exceeded, got {other:?}"),
        }

        let mut grace_reason = None;
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::GraceExceeded {
                grace_reason = ev.reason.clone();
            }
            kinds.push(ev.kind);
        }
        assert_eq!(
            grace_reason.as_deref(),
            Some("stubborn#0=running,stubborn#1=running")
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::ReplicaAborted).count(),
            2
        );
        assert!(!kinds.contains(&EventKind::AllStoppedWithin));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(orch.alive().snapshot().await.is_empty());
        assert_eq!(
            orch.alive().state_of("stubborn#1").await,
            Some(crate::group::ReplicaState::Aborted)
        );
    }
}
