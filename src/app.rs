//! # Flight pipeline.
//!
//! Composition root: builds the orchestrator, the three queues and the four
//! groups from a [`Config`], then watches the outputs until the vehicle is
//! lost, the run time ends or a termination signal arrives.
//!
//! ```text
//! heartbeat_sender   ──► vehicle
//! heartbeat_receiver ──► [heartbeat] ─────────────────────────► main loop
//! telemetry          ──► [telemetry] ──► command ──► [command] ──► main loop
//! ```
//!
//! The drain order derived from this wiring is
//! `heartbeat → command → telemetry`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::core::{Orchestrator, ShutdownReport};
use crate::error::RuntimeError;
use crate::group::WorkerProperties;
use crate::link::LinkRef;
use crate::queue::BoundedQueue;
use crate::roles::{
    Action, CommandArgs, DEFAULT_RECEIVE_TIMEOUT, HeartbeatReceiverArgs, HeartbeatReport,
    HeartbeatSenderArgs, TelemetryArgs, TelemetryData, command_worker, heartbeat_receiver_worker,
    heartbeat_sender_worker, telemetry_worker,
};
use crate::subscribers::Subscribe;

/// Group names, in start order.
pub const GROUPS: [&str; 4] = ["heartbeat_sender", "heartbeat_receiver", "telemetry", "command"];

fn subscribers() -> Vec<Arc<dyn Subscribe>> {
    #[cfg(feature = "logging")]
    {
        vec![Arc::new(crate::subscribers::LogWriter::new())]
    }
    #[cfg(not(feature = "logging"))]
    {
        Vec::new()
    }
}

/// Runs the flight pipeline over `link` until it ends, then shuts it down.
///
/// The controller's exit flag is cleared before returning.
///
/// ### Errors
/// - setup failures ([`RuntimeError::is_setup`]): invalid replica counts, no
///   runtime, cyclic wiring;
/// - [`RuntimeError::GraceExceeded`] when replicas had to be aborted.
pub async fn run(cfg: &Config, link: LinkRef) -> Result<ShutdownReport, RuntimeError> {
    let mut orch = Orchestrator::builder(cfg.orchestrator())
        .with_subscribers(subscribers())
        .build()?;

    let heartbeat = orch.queue::<HeartbeatReport>("heartbeat", cfg.queues.heartbeat);
    let telemetry = orch.queue::<TelemetryData>("telemetry", cfg.queues.telemetry);
    let command = orch.queue::<Action>("command", cfg.queues.command);

    let controller = orch.controller().clone();
    let poll = cfg.poll_timeout();

    orch.add_group(
        WorkerProperties::create(
            GROUPS[0],
            cfg.workers.heartbeat_sender,
            heartbeat_sender_worker,
            HeartbeatSenderArgs {
                link: Arc::clone(&link),
                period: cfg.heartbeat_period(),
            },
            vec![],
            vec![],
            &controller,
        )?
        .with_poll_timeout(poll),
    )?;
    orch.add_group(
        WorkerProperties::create(
            GROUPS[1],
            cfg.workers.heartbeat_receiver,
            heartbeat_receiver_worker,
            HeartbeatReceiverArgs {
                link: Arc::clone(&link),
                period: cfg.heartbeat_period(),
                threshold: cfg.disconnect_threshold,
            },
            vec![],
            vec![heartbeat.clone()],
            &controller,
        )?
        .with_poll_timeout(poll),
    )?;
    orch.add_group(
        WorkerProperties::create(
            GROUPS[2],
            cfg.workers.telemetry,
            telemetry_worker,
            TelemetryArgs {
                link: Arc::clone(&link),
                window: cfg.telemetry_window(),
                receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            },
            vec![],
            vec![telemetry.clone()],
            &controller,
        )?
        .with_poll_timeout(poll),
    )?;
    orch.add_group(
        WorkerProperties::create(
            GROUPS[3],
            cfg.workers.command,
            command_worker,
            CommandArgs {
                link,
                target: cfg.target,
                tolerances: cfg.tolerances(),
            },
            vec![telemetry],
            vec![command.clone()],
            &controller,
        )?
        .with_poll_timeout(poll),
    )?;

    let limit = cfg.run_limit();
    let result = orch
        .run(|_| watch(heartbeat, command, poll, limit))
        .await;
    controller.clear_exit();

    match &result {
        Ok(report) => tracing::info!(
            stopped = report.joined.stopped,
            failed = report.joined.failed,
            crashed = report.joined.crashed,
            "pipeline finished"
        ),
        Err(e) => tracing::error!(error = %e, label = e.as_label(), "pipeline failed"),
    }
    result
}

/// Consumes the command and heartbeat outputs until the vehicle is lost or
/// `limit` elapses.
async fn watch(
    heartbeat: BoundedQueue<HeartbeatReport>,
    command: BoundedQueue<Action>,
    poll: Duration,
    limit: Option<Duration>,
) {
    let deadline = limit.map(|d| Instant::now() + d);

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("run duration elapsed");
            break;
        }

        if let Some(action) = command.get(poll).await {
            tracing::info!(%action, "command");
        }

        if let Some(report) = heartbeat.get(poll).await {
            tracing::info!(%report, "heartbeat");
            if report.lost {
                tracing::warn!(missed = report.missed, "vehicle disconnected, stopping");
                break;
            }
        }
    }
}
