//! # Flight roles.
//!
//! Each role is a small state holder built through a fallible `create`
//! factory, with a `run_once` step and an async worker entry point that
//! loops that step under [`WorkerContext::running`](crate::WorkerContext::running).
//!
//! | role | input | output |
//! |---|---|---|
//! | heartbeat sender | none | none |
//! | heartbeat receiver | none | [`HeartbeatReport`] |
//! | telemetry | none | [`TelemetryData`] |
//! | command | [`TelemetryData`] | [`Action`] |

mod command;
mod heartbeat;
mod telemetry;

pub use command::{Action, Command, CommandArgs, Position, Tolerances, command_worker};
pub use heartbeat::{
    ConnectionState, HeartbeatReceiver, HeartbeatReceiverArgs, HeartbeatReport, HeartbeatSender,
    HeartbeatSenderArgs, heartbeat_receiver_worker, heartbeat_sender_worker,
};
pub use telemetry::{
    DEFAULT_RECEIVE_TIMEOUT, DEFAULT_WINDOW, Telemetry, TelemetryArgs, TelemetryData,
    telemetry_worker,
};
