//! # Heartbeat roles.
//!
//! - [`HeartbeatSender`] sends one heartbeat per period so the vehicle keeps
//!   the link alive. Send failures are logged and the loop goes on.
//! - [`HeartbeatReceiver`] checks for a vehicle heartbeat once per period
//!   and runs the connection state machine:
//!
//! ```text
//!              miss (missed < threshold)
//!            ┌──────────┐
//!            ▼          │
//! DISCONNECTED ──recv──► CONNECTED ──miss × threshold──► DISCONNECTED
//!   (initial)    missed = 0
//! ```
//!
//! A receive error counts as a miss.

use std::fmt;
use std::time::{Duration, SystemTime};

use tokio::time::{self, MissedTickBehavior};

use crate::error::WorkError;
use crate::link::{LinkRef, MessageKind};
use crate::workers::WorkerContext;

/// Connection state derived from received heartbeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
        })
    }
}

/// Status emitted by the receiver once per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub state: ConnectionState,
    /// Consecutive misses so far.
    pub missed: u32,
    /// True once `missed` reached the disconnect threshold.
    pub lost: bool,
    pub at: SystemTime,
}

impl fmt::Display for HeartbeatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self
            .at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        write!(f, "{} at {}s (missed {})", self.state, secs, self.missed)
    }
}

/// Sends heartbeats.
pub struct HeartbeatSender {
    link: LinkRef,
}

impl HeartbeatSender {
    pub fn create(link: LinkRef) -> Result<Self, WorkError> {
        Ok(Self { link })
    }

    /// Sends one heartbeat; returns whether the link accepted it.
    pub fn run_once(&self) -> bool {
        match self.link.send_heartbeat() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "failed to send heartbeat");
                false
            }
        }
    }
}

/// Tracks vehicle heartbeats.
pub struct HeartbeatReceiver {
    link: LinkRef,
    threshold: u32,
    missed: u32,
    state: ConnectionState,
}

impl HeartbeatReceiver {
    /// Creates a receiver that declares the vehicle lost after `threshold`
    /// consecutive misses.
    ///
    /// ### Errors
    /// `WorkError::Fatal` when `threshold` is zero.
    pub fn create(link: LinkRef, threshold: u32) -> Result<Self, WorkError> {
        if threshold == 0 {
            return Err(WorkError::fatal("disconnect threshold must be >= 1"));
        }
        Ok(Self {
            link,
            threshold,
            missed: 0,
            state: ConnectionState::Disconnected,
        })
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive misses.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Feeds one check result into the state machine.
    pub fn observe(&mut self, received: bool) -> HeartbeatReport {
        if received {
            self.missed = 0;
            self.state = ConnectionState::Connected;
        } else {
            self.missed = self.missed.saturating_add(1);
            tracing::warn!(missed = self.missed, "missed heartbeat");
            if self.missed >= self.threshold {
                self.state = ConnectionState::Disconnected;
            }
        }
        tracing::info!(status = %self.state, "heartbeat status");

        HeartbeatReport {
            state: self.state,
            missed: self.missed,
            lost: self.missed >= self.threshold,
            at: SystemTime::now(),
        }
    }

    /// Checks the link for a heartbeat without waiting.
    pub async fn run_once(&mut self) -> HeartbeatReport {
        let received = match self
            .link
            .receive(&[MessageKind::Heartbeat], Duration::ZERO)
            .await
        {
            Ok(msg) => msg.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "heartbeat receive failed");
                false
            }
        };
        self.observe(received)
    }
}

/// Static arguments of the heartbeat sender group.
#[derive(Clone)]
pub struct HeartbeatSenderArgs {
    pub link: LinkRef,
    pub period: Duration,
}

/// Static arguments of the heartbeat receiver group.
#[derive(Clone)]
pub struct HeartbeatReceiverArgs {
    pub link: LinkRef,
    pub period: Duration,
    pub threshold: u32,
}

fn ticker(period: Duration) -> time::Interval {
    let mut t = time::interval(period);
    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
    t
}

/// Entry point of a heartbeat sender replica.
pub async fn heartbeat_sender_worker(
    args: HeartbeatSenderArgs,
    ctx: WorkerContext<(), ()>,
) -> Result<(), WorkError> {
    let sender = HeartbeatSender::create(args.link)?;
    let mut tick = ticker(args.period);
    tracing::info!(replica = %ctx.replica(), "heartbeat sender started");

    while ctx.running().await {
        tick.tick().await;
        sender.run_once();
    }

    tracing::info!(replica = %ctx.replica(), "heartbeat sender stopped");
    Ok(())
}

/// Entry point of a heartbeat receiver replica.
pub async fn heartbeat_receiver_worker(
    args: HeartbeatReceiverArgs,
    ctx: WorkerContext<(), HeartbeatReport>,
) -> Result<(), WorkError> {
    let mut receiver = HeartbeatReceiver::create(args.link, args.threshold)?;
    let mut tick = ticker(args.period);
    tracing::info!(replica = %ctx.replica(), "heartbeat receiver started");

    while ctx.running().await {
        tick.tick().await;
        let report = receiver.run_once().await;
        ctx.send(report).await;
    }

    tracing::info!(replica = %ctx.replica(), "heartbeat receiver stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Message, ScriptedLink};
    use std::sync::Arc;

    fn receiver() -> HeartbeatReceiver {
        HeartbeatReceiver::create(Arc::new(ScriptedLink::new()), 5).unwrap()
    }

    #[test]
    fn test_four_misses_then_success_connects() {
        let mut r = receiver();
        for _ in 0..4 {
            r.observe(false);
        }
        let report = r.observe(true);
        assert_eq!(report.state, ConnectionState::Connected);
        assert_eq!(report.missed, 0);
        assert!(!report.lost);
    }

    #[test]
    fn test_five_misses_disconnect() {
        let mut r = receiver();
        r.observe(true);
        for _ in 0..4 {
            assert_eq!(r.observe(false).state, ConnectionState::Connected);
        }
        let report = r.observe(false);
        assert_eq!(report.state, ConnectionState::Disconnected);
        assert!(report.lost);
    }

    #[test]
    fn test_initial_state_is_disconnected_but_not_lost() {
        let mut r = receiver();
        assert_eq!(r.state(), ConnectionState::Disconnected);
        let report = r.observe(false);
        assert_eq!(report.state, ConnectionState::Disconnected);
        assert!(!report.lost);
    }

    #[test]
    fn test_zero_threshold_is_fatal() {
        let err = HeartbeatReceiver::create(Arc::new(ScriptedLink::new()), 0)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_run_once_reads_link() {
        let link = Arc::new(ScriptedLink::new());
        link.push(Message::Heartbeat)
            .push_miss(MessageKind::Heartbeat);
        let mut r = HeartbeatReceiver::create(link, 5).unwrap();

        assert_eq!(r.run_once().await.state, ConnectionState::Connected);
        let second = r.run_once().await;
        assert_eq!(second.state, ConnectionState::Connected);
        assert_eq!(second.missed, 1);
    }

    #[test]
    fn test_sender_reports_failure() {
        let link = Arc::new(ScriptedLink::new());
        let sender = HeartbeatSender::create(link.clone()).unwrap();
        assert!(sender.run_once());
        link.set_send_failure(true);
        assert!(!sender.run_once());
        assert_eq!(link.heartbeats_sent(), 1);
    }
}
