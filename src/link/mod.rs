//! # Vehicle link.
//!
//! The wire protocol is external; roles talk to the vehicle only through
//! [`FlightLink`]. One link is shared by every role of a pipeline.
//!
//! ```text
//! heartbeat sender ──send_heartbeat()──┐
//! heartbeat receiver ──receive([HEARTBEAT])──┤
//! telemetry ──receive([LOCAL_POSITION_NED, ATTITUDE])──┼──► FlightLink ──► vehicle
//! command ──send_command(..)──┘
//! ```

mod message;
pub mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LinkError;

pub use message::{
    Attitude, LocalPositionNed, Message, MessageKind, TARGET_COMPONENT, TARGET_SYSTEM,
    VehicleCommand,
};
pub use scripted::ScriptedLink;

/// Shared handle to a link.
pub type LinkRef = Arc<dyn FlightLink>;

/// Connection to the vehicle.
#[async_trait]
pub trait FlightLink: Send + Sync + 'static {
    /// Receives the next message whose kind is in `kinds`.
    ///
    /// Waits at most `timeout`; a zero timeout does not wait. `Ok(None)`
    /// means nothing matching arrived in time.
    async fn receive(
        &self,
        kinds: &[MessageKind],
        timeout: Duration,
    ) -> Result<Option<Message>, LinkError>;

    /// Hands a command to the link (fire and forget).
    fn send_command(&self, cmd: &VehicleCommand) -> Result<(), LinkError>;

    /// Sends one heartbeat (fire and forget).
    fn send_heartbeat(&self) -> Result<(), LinkError>;
}
