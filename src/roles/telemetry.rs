//! # Telemetry role.
//!
//! Collects one position and one attitude message within a time window and
//! fuses them into a [`TelemetryData`] record. If either kind is missing when
//! the window closes, nothing is produced.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::WorkError;
use crate::link::{Attitude, LinkRef, LocalPositionNed, Message, MessageKind};
use crate::workers::WorkerContext;

const KINDS: [MessageKind; 2] = [MessageKind::LocalPositionNed, MessageKind::Attitude];

/// Default collection window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);
/// Default wait of a single receive inside the window.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Fused position and attitude sample.
///
/// `time_boot_ms` is the later of the two source timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryData {
    pub time_boot_ms: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll_speed: f32,
    pub pitch_speed: f32,
    pub yaw_speed: f32,
}

impl TelemetryData {
    /// Fuses one position and one attitude sample.
    pub fn fuse(pos: &LocalPositionNed, att: &Attitude) -> Self {
        Self {
            time_boot_ms: pos.time_boot_ms.max(att.time_boot_ms),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            vx: pos.vx,
            vy: pos.vy,
            vz: pos.vz,
            roll: att.roll,
            pitch: att.pitch,
            yaw: att.yaw,
            roll_speed: att.rollspeed,
            pitch_speed: att.pitchspeed,
            yaw_speed: att.yawspeed,
        }
    }
}

/// Windowed telemetry collector.
pub struct Telemetry {
    link: LinkRef,
    window: Duration,
    receive_timeout: Duration,
}

impl Telemetry {
    /// ### Errors
    /// `WorkError::Fatal` when `window` is zero.
    pub fn create(
        link: LinkRef,
        window: Duration,
        receive_timeout: Duration,
    ) -> Result<Self, WorkError> {
        if window.is_zero() {
            return Err(WorkError::fatal("telemetry window must be non-zero"));
        }
        Ok(Self {
            link,
            window,
            receive_timeout,
        })
    }

    /// Runs one collection window.
    ///
    /// Returns as soon as both kinds were seen; later messages of a kind
    /// replace earlier ones within the same window.
    pub async fn run_once(&self) -> Option<TelemetryData> {
        let deadline = Instant::now() + self.window;
        let mut position: Option<LocalPositionNed> = None;
        let mut attitude: Option<Attitude> = None;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self.receive_timeout.min(deadline - now);

            match self.link.receive(&KINDS, wait).await {
                Ok(Some(Message::LocalPositionNed(p))) => position = Some(p),
                Ok(Some(Message::Attitude(a))) => attitude = Some(a),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "telemetry receive failed");
                    tokio::time::sleep(wait).await;
                }
            }

            if position.is_some() && attitude.is_some() {
                break;
            }
        }

        match (position, attitude) {
            (Some(p), Some(a)) => Some(TelemetryData::fuse(&p, &a)),
            _ => {
                tracing::debug!("telemetry window closed without a full sample");
                None
            }
        }
    }
}

/// Static arguments of the telemetry group.
#[derive(Clone)]
pub struct TelemetryArgs {
    pub link: LinkRef,
    pub window: Duration,
    pub receive_timeout: Duration,
}

/// Entry point of a telemetry replica.
pub async fn telemetry_worker(
    args: TelemetryArgs,
    ctx: WorkerContext<(), TelemetryData>,
) -> Result<(), WorkError> {
    let telemetry = Telemetry::create(args.link, args.window, args.receive_timeout)?;
    tracing::info!(replica = %ctx.replica(), "telemetry started");

    while ctx.running().await {
        if let Some(data) = telemetry.run_once().await {
            ctx.send(data).await;
        }
    }

    tracing::info!(replica = %ctx.replica(), "telemetry stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ScriptedLink;
    use std::sync::Arc;

    fn position(ts: u32) -> Message {
        Message::LocalPositionNed(LocalPositionNed {
            time_boot_ms: ts,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            vx: 4.0,
            vy: 5.0,
            vz: 6.0,
        })
    }

    fn attitude(ts: u32) -> Message {
        Message::Attitude(Attitude {
            time_boot_ms: ts,
            roll: 0.1,
            pitch: 0.2,
            yaw: 0.3,
            rollspeed: 0.4,
            pitchspeed: 0.5,
            yawspeed: 0.6,
        })
    }

    fn telemetry(link: Arc<ScriptedLink>) -> Telemetry {
        Telemetry::create(link, DEFAULT_WINDOW, DEFAULT_RECEIVE_TIMEOUT).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fuses_with_latest_timestamp() {
        let link = Arc::new(ScriptedLink::new());
        link.push(position(100)).push(attitude(150));

        let data = telemetry(link).run_once().await.unwrap();
        assert_eq!(
            data,
            TelemetryData {
                time_boot_ms: 150,
                x: 1.0,
                y: 2.0,
                z: 3.0,
                vx: 4.0,
                vy: 5.0,
                vz: 6.0,
                roll: 0.1,
                pitch: 0.2,
                yaw: 0.3,
                roll_speed: 0.4,
                pitch_speed: 0.5,
                yaw_speed: 0.6,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_kind_yields_nothing() {
        let link = Arc::new(ScriptedLink::new());
        link.push(position(100));

        let started = Instant::now();
        assert_eq!(telemetry(link).run_once().await, None);
        assert!(started.elapsed() >= DEFAULT_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_early_once_both_seen() {
        let link = Arc::new(ScriptedLink::new());
        link.push(attitude(10)).push(position(20)).push(position(30));

        let started = Instant::now();
        let data = telemetry(link.clone()).run_once().await.unwrap();
        assert_eq!(data.time_boot_ms, 20);
        assert!(started.elapsed() < DEFAULT_WINDOW);
        assert_eq!(link.remaining(), 1);
    }

    #[test]
    fn test_zero_window_is_fatal() {
        let res = Telemetry::create(
            Arc::new(ScriptedLink::new()),
            Duration::ZERO,
            DEFAULT_RECEIVE_TIMEOUT,
        );
        assert!(res.err().unwrap().is_fatal());
    }
}
