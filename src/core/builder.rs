use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{alive::AliveTracker, config::OrchestratorConfig, orchestrator::Orchestrator};
use crate::{
    controller::Controller,
    error::RuntimeError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: OrchestratorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    controller: Option<Controller>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: OrchestratorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            controller: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (replicas, groups, drain progress)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an existing controller instead of a fresh one.
    ///
    /// Useful when descriptors were validated against a controller created
    /// before the orchestrator.
    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Builds the orchestrator and starts its event listener.
    ///
    /// ### Errors
    /// [`RuntimeError::NoRuntime`] when called outside a tokio runtime.
    pub fn build(self) -> Result<Orchestrator, RuntimeError> {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let alive = Arc::new(AliveTracker::new());
        let listener = CancellationToken::new();

        Self::spawn_listener(&handle, &bus, &subs, &alive, listener.clone());

        Ok(Orchestrator::new_internal(
            self.cfg,
            self.controller.unwrap_or_default(),
            bus,
            alive,
            listener,
        ))
    }

    /// Forwards every bus event to the alive tracker and the subscriber set
    /// until the orchestrator is dropped, then flushes the subscribers.
    fn spawn_listener(
        handle: &Handle,
        bus: &Bus,
        subs: &Arc<SubscriberSet>,
        alive: &Arc<AliveTracker>,
        token: CancellationToken,
    ) {
        let mut rx = bus.subscribe();
        let subs = Arc::clone(subs);
        let alive = Arc::clone(alive);

        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => {
                            alive.update(&ev).await;
                            subs.emit(&ev);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            if let Ok(subs) = Arc::try_unwrap(subs) {
                subs.shutdown().await;
            }
        });
    }
}
