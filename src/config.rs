//! # Flight configuration.
//!
//! [`Config`] gathers every setting of the flight pipeline: queue
//! capacities, replica counts, role parameters and the shutdown timing. It is
//! loaded from YAML; every key is optional.
//!
//! ```yaml
//! queues:
//!   heartbeat: 5
//!   telemetry: 10
//!   command: 5
//! workers:
//!   telemetry: 1
//! heartbeat_period_ms: 1000
//! disconnect_threshold: 5
//! target: { x: 10.0, y: 20.0, z: 5.0 }
//! grace_ms: 60000
//! ```
//!
//! ## Sentinel values
//! - queue capacity `0` → unbounded
//! - `run_duration_ms = 0` → run until a signal or a disconnect
//! - `grace_ms = 0` → join waits without a deadline
//! - `bus_capacity = 0` → clamped to 1
//!
//! # Example
//! ```
//! use flightvisor::Config;
//!
//! let cfg = Config::from_yaml("queues: { telemetry: 0 }\nrun_duration_ms: 0\n").unwrap();
//! assert_eq!(cfg.capacity_limit(cfg.queues.telemetry), None);
//! assert_eq!(cfg.run_limit(), None);
//! assert_eq!(cfg.disconnect_threshold, 5);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::OrchestratorConfig;
use crate::error::ConfigError;
use crate::roles::{Position, Tolerances};

/// Capacities of the three pipeline queues (`0` = unbounded).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSizes {
    pub heartbeat: usize,
    pub telemetry: usize,
    pub command: usize,
}

impl Default for QueueSizes {
    fn default() -> Self {
        Self {
            heartbeat: 5,
            telemetry: 10,
            command: 5,
        }
    }
}

/// Replica count of each group.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerCounts {
    pub heartbeat_sender: usize,
    pub heartbeat_receiver: usize,
    pub telemetry: usize,
    pub command: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            heartbeat_sender: 1,
            heartbeat_receiver: 1,
            telemetry: 1,
            command: 1,
        }
    }
}

/// Settings of the flight pipeline.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub queues: QueueSizes,
    pub workers: WorkerCounts,
    /// Heartbeat send and check period.
    pub heartbeat_period_ms: u64,
    /// Consecutive misses before the vehicle is considered disconnected.
    pub disconnect_threshold: u32,
    /// Telemetry fusion window.
    pub telemetry_window_ms: u64,
    pub target: Position,
    pub altitude_tolerance_m: f32,
    pub yaw_tolerance_deg: f32,
    /// Queue get/put poll timeout, also used by the shutdown drain.
    pub poll_timeout_ms: u64,
    /// Run time of the pipeline (`0` = unlimited).
    pub run_duration_ms: u64,
    /// Join grace (`0` = no deadline).
    pub grace_ms: u64,
    pub bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queues: QueueSizes::default(),
            workers: WorkerCounts::default(),
            heartbeat_period_ms: 1000,
            disconnect_threshold: 5,
            telemetry_window_ms: 1000,
            target: Position::default(),
            altitude_tolerance_m: 0.5,
            yaw_tolerance_deg: 5.0,
            poll_timeout_ms: 100,
            run_duration_ms: 100_000,
            grace_ms: 60_000,
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Reads and validates a YAML file.
    ///
    /// ### Errors
    /// [`ConfigError::Io`] when the file cannot be read, otherwise any error
    /// of [`Config::from_yaml`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates YAML text.
    ///
    /// An empty document yields the defaults.
    ///
    /// ### Errors
    /// [`ConfigError::Parse`] on malformed YAML or unknown keys,
    /// [`ConfigError::Invalid`] when [`validate`](Self::validate) rejects it.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects settings no pipeline can run with.
    ///
    /// Replica counts are checked later by `WorkerProperties::create`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid("poll_timeout_ms must be > 0".into()));
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_period_ms must be > 0".into(),
            ));
        }
        if self.telemetry_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "telemetry_window_ms must be > 0".into(),
            ));
        }
        if self.disconnect_threshold == 0 {
            return Err(ConfigError::Invalid(
                "disconnect_threshold must be >= 1".into(),
            ));
        }
        let t = self.tolerances();
        if !(t.altitude >= 0.0 && t.yaw >= 0.0 && t.altitude.is_finite() && t.yaw.is_finite()) {
            return Err(ConfigError::Invalid(format!("invalid tolerances: {t:?}")));
        }
        Ok(())
    }

    /// Returns a queue capacity as an `Option` (`None` = unbounded).
    #[inline]
    pub fn capacity_limit(&self, capacity: usize) -> Option<usize> {
        if capacity == 0 { None } else { Some(capacity) }
    }

    /// Returns the join grace as an `Option` (`None` = no deadline).
    #[inline]
    pub fn join_grace(&self) -> Option<Duration> {
        if self.grace_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.grace_ms))
        }
    }

    /// Returns the run time as an `Option` (`None` = unlimited).
    #[inline]
    pub fn run_limit(&self) -> Option<Duration> {
        if self.run_duration_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.run_duration_ms))
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    pub fn telemetry_window(&self) -> Duration {
        Duration::from_millis(self.telemetry_window_ms)
    }

    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            altitude: self.altitude_tolerance_m,
            yaw: self.yaw_tolerance_deg,
        }
    }

    /// Settings of the shutdown protocol.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll: self.poll_timeout(),
            grace: Duration::from_millis(self.grace_ms),
            bus_capacity: self.bus_capacity_clamped(),
        }
    }
}
