use std::fmt;

/// Message types a link can be asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Heartbeat,
    LocalPositionNed,
    Attitude,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::LocalPositionNed => "LOCAL_POSITION_NED",
            MessageKind::Attitude => "ATTITUDE",
        })
    }
}

/// Local position in the NED frame (metres, metres per second).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalPositionNed {
    pub time_boot_ms: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
}

/// Vehicle attitude (radians, radians per second).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    pub time_boot_ms: u32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub rollspeed: f32,
    pub pitchspeed: f32,
    pub yawspeed: f32,
}

/// A decoded message received from the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Heartbeat,
    LocalPositionNed(LocalPositionNed),
    Attitude(Attitude),
}

impl Message {
    /// Type tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Heartbeat => MessageKind::Heartbeat,
            Message::LocalPositionNed(_) => MessageKind::LocalPositionNed,
            Message::Attitude(_) => MessageKind::Attitude,
        }
    }
}

/// Target system every command is addressed to.
pub const TARGET_SYSTEM: u8 = 1;
/// Target component every command is addressed to.
pub const TARGET_COMPONENT: u8 = 0;

/// Commands the decision role sends to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleCommand {
    /// Climb or descend to an absolute altitude.
    ChangeAltitude {
        target_system: u8,
        target_component: u8,
        /// Ascend/descend rate, m/s.
        climb_rate: f32,
        /// Target altitude, m.
        altitude: f32,
    },
    /// Turn by a relative angle.
    Yaw {
        target_system: u8,
        target_component: u8,
        /// Signed angle, degrees.
        angle_deg: f32,
        /// Angular speed, deg/s.
        angular_speed: f32,
        /// `-1` counter-clockwise, `1` clockwise.
        direction: i8,
        /// Angle is relative to the current heading.
        relative: bool,
    },
}

impl VehicleCommand {
    /// Altitude change at 1 m/s towards `altitude`.
    pub fn change_altitude(altitude: f32) -> Self {
        VehicleCommand::ChangeAltitude {
            target_system: TARGET_SYSTEM,
            target_component: TARGET_COMPONENT,
            climb_rate: 1.0,
            altitude,
        }
    }

    /// Relative yaw at 5 deg/s; a positive angle turns counter-clockwise.
    pub fn relative_yaw(angle_deg: f32) -> Self {
        VehicleCommand::Yaw {
            target_system: TARGET_SYSTEM,
            target_component: TARGET_COMPONENT,
            angle_deg,
            angular_speed: 5.0,
            direction: if angle_deg > 0.0 { -1 } else { 1 },
            relative: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaw_direction_follows_sign() {
        let ccw = VehicleCommand::relative_yaw(10.0);
        let cw = VehicleCommand::relative_yaw(-10.0);
        assert!(matches!(ccw, VehicleCommand::Yaw { direction: -1, relative: true, .. }));
        assert!(matches!(cw, VehicleCommand::Yaw { direction: 1, .. }));
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(Message::Heartbeat.kind(), MessageKind::Heartbeat);
        assert_eq!(
            Message::Attitude(Attitude::default()).kind().to_string(),
            "ATTITUDE"
        );
    }
}
