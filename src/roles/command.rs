//! # Command role.
//!
//! Consumes fused telemetry and steers the vehicle towards a target
//! position. Altitude is corrected first; heading is only evaluated once the
//! altitude error is within tolerance.

use std::fmt;

use serde::Deserialize;

use crate::error::WorkError;
use crate::link::{LinkRef, VehicleCommand};
use crate::roles::TelemetryData;
use crate::workers::WorkerContext;

/// Target position in the local NED frame, metres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 5.0,
        }
    }
}

/// Dead bands inside which no correction is issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Metres.
    pub altitude: f32,
    /// Degrees.
    pub yaw: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            altitude: 0.5,
            yaw: 5.0,
        }
    }
}

/// Correction issued to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Signed distance to the target altitude, metres.
    ChangeAltitude { delta_m: f32 },
    /// Signed relative heading change in `[-180, 180)`, degrees.
    ChangeYaw { degrees: f32 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ChangeAltitude { delta_m } => write!(f, "CHANGE ALTITUDE: {delta_m}m"),
            Action::ChangeYaw { degrees } => write!(f, "CHANGE YAW: {degrees}"),
        }
    }
}

/// Wraps an angle in degrees into `[-180, 180)`.
fn wrap_degrees(deg: f32) -> f32 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Decision state: target, tolerances and the running velocity average.
pub struct Command {
    link: LinkRef,
    target: Position,
    tolerances: Tolerances,
    velocity_sum: [f64; 3],
    samples: u64,
}

impl Command {
    /// ### Errors
    /// `WorkError::Fatal` when a tolerance is negative or not finite.
    pub fn create(
        link: LinkRef,
        target: Position,
        tolerances: Tolerances,
    ) -> Result<Self, WorkError> {
        let valid = |t: f32| t.is_finite() && t >= 0.0;
        if !valid(tolerances.altitude) || !valid(tolerances.yaw) {
            return Err(WorkError::fatal(format!(
                "invalid tolerances: {tolerances:?}"
            )));
        }
        Ok(Self {
            link,
            target,
            tolerances,
            velocity_sum: [0.0; 3],
            samples: 0,
        })
    }

    /// Mean velocity over every sample seen so far.
    pub fn average_velocity(&self) -> Option<[f64; 3]> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        Some(self.velocity_sum.map(|v| v / n))
    }

    /// Picks the correction for one sample without side effects.
    pub fn decide(&self, data: &TelemetryData) -> Option<Action> {
        let delta_z = self.target.z - data.z;
        if delta_z.abs() > self.tolerances.altitude {
            return Some(Action::ChangeAltitude { delta_m: delta_z });
        }

        let bearing = (self.target.y - data.y)
            .atan2(self.target.x - data.x)
            .to_degrees();
        let yaw_error = wrap_degrees(bearing - data.yaw.to_degrees());
        if yaw_error.abs() > self.tolerances.yaw {
            return Some(Action::ChangeYaw { degrees: yaw_error });
        }

        None
    }

    /// Records the sample, decides, and sends the matching command.
    ///
    /// Returns `None` when no correction is needed or the link rejected the
    /// command.
    pub fn run_once(&mut self, data: &TelemetryData) -> Option<Action> {
        self.velocity_sum[0] += f64::from(data.vx);
        self.velocity_sum[1] += f64::from(data.vy);
        self.velocity_sum[2] += f64::from(data.vz);
        self.samples += 1;
        if let Some([vx, vy, vz]) = self.average_velocity() {
            tracing::info!(vx, vy, vz, "average velocity");
        }

        let action = self.decide(data)?;
        let cmd = match action {
            Action::ChangeAltitude { .. } => VehicleCommand::change_altitude(self.target.z),
            Action::ChangeYaw { degrees } => VehicleCommand::relative_yaw(degrees),
        };
        if let Err(e) = self.link.send_command(&cmd) {
            tracing::warn!(error = %e, %action, "command not sent");
            return None;
        }
        Some(action)
    }
}

/// Static arguments of the command group.
#[derive(Clone)]
pub struct CommandArgs {
    pub link: LinkRef,
    pub target: Position,
    pub tolerances: Tolerances,
}

/// Entry point of a command replica.
pub async fn command_worker(
    args: CommandArgs,
    ctx: WorkerContext<TelemetryData, Action>,
) -> Result<(), WorkError> {
    let mut command = Command::create(args.link, args.target, args.tolerances)?;
    tracing::info!(replica = %ctx.replica(), "command started");

    while ctx.running().await {
        let Some(data) = ctx.recv().await else {
            continue;
        };
        if let Some(action) = command.run_once(&data) {
            ctx.send(action).await;
        }
    }

    tracing::info!(replica = %ctx.replica(), "command stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ScriptedLink;
    use std::sync::Arc;

    fn command(link: Arc<ScriptedLink>) -> Command {
        Command::create(link, Position::default(), Tolerances::default()).unwrap()
    }

    #[test]
    fn test_altitude_first() {
        let link = Arc::new(ScriptedLink::new());
        let mut cmd = command(link.clone());
        let data = TelemetryData {
            z: 4.0,
            yaw: 1.0,
            ..Default::default()
        };

        assert_eq!(
            cmd.run_once(&data),
            Some(Action::ChangeAltitude { delta_m: 1.0 })
        );
        assert_eq!(
            link.commands(),
            vec![VehicleCommand::change_altitude(5.0)]
        );
        assert_eq!(
            Action::ChangeAltitude { delta_m: 1.0 }.to_string(),
            "CHANGE ALTITUDE: 1m"
        );
    }

    #[test]
    fn test_yaw_when_altitude_within_tolerance() {
        let link = Arc::new(ScriptedLink::new());
        let mut cmd = command(link.clone());
        // target straight ahead along +x, vehicle heading -10 degrees
        let data = TelemetryData {
            x: -1.0,
            z: 5.2,
            yaw: (-10.0f32).to_radians(),
            ..Default::default()
        };

        let Some(Action::ChangeYaw { degrees }) = cmd.run_once(&data) else {
            panic!("expected a yaw action");
        };
        assert!((degrees - 10.0).abs() < 1e-3);
        assert!((-180.0..=180.0).contains(&degrees));
        assert!(matches!(
            link.commands().as_slice(),
            [VehicleCommand::Yaw { direction: -1, .. }]
        ));
    }

    #[test]
    fn test_no_action_within_tolerance() {
        let link = Arc::new(ScriptedLink::new());
        let mut cmd = command(link.clone());
        let data = TelemetryData {
            x: -1.0,
            z: 5.0,
            yaw: 0.02,
            ..Default::default()
        };
        assert_eq!(cmd.run_once(&data), None);
        assert!(link.commands().is_empty());
    }

    #[test]
    fn test_yaw_error_wraps() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(0.0), 0.0);
    }

    #[test]
    fn test_average_velocity() {
        let mut cmd = command(Arc::new(ScriptedLink::new()));
        assert_eq!(cmd.average_velocity(), None);
        for vx in [1.0, 3.0] {
            cmd.run_once(&TelemetryData {
                vx,
                z: 5.0,
                x: -1.0,
                ..Default::default()
            });
        }
        assert_eq!(cmd.average_velocity(), Some([2.0, 0.0, 0.0]));
    }

    #[test]
    fn test_failed_send_reports_nothing() {
        let link = Arc::new(ScriptedLink::new());
        link.set_send_failure(true);
        let mut cmd = command(link);
        let data = TelemetryData {
            z: 0.0,
            ..Default::default()
        };
        assert_eq!(cmd.run_once(&data), None);
    }

    #[test]
    fn test_negative_tolerance_is_fatal() {
        let res = Command::create(
            Arc::new(ScriptedLink::new()),
            Position::default(),
            Tolerances {
                altitude: -1.0,
                yaw: 5.0,
            },
        );
        assert!(res.err().unwrap().is_fatal());
    }
}
