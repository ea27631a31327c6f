//! Error types used by the orchestration runtime, worker groups and roles.
//!
//! - [`RuntimeError`]: failures of the orchestrator itself (setup or shutdown).
//! - [`WorkerGroupError`]: descriptor validation and group lifecycle misuse.
//! - [`PipelineError`]: queue wiring that cannot be drained safely.
//! - [`WorkError`]: failures raised by a replica's unit of work.
//! - [`LinkError`]: failures reported by the vehicle link.
//! - [`ConfigError`]: configuration loading and validation.
//!
//! Every enum provides `as_label` (stable snake_case for logs) and, where the
//! `Display` output is not already the whole story, `as_message`.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the orchestrator.
///
/// Setup variants are returned before any replica is spawned; `GraceExceeded`
/// is the only variant produced after workers have started.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Join grace period was exceeded; the listed replicas were aborted.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}; replicas aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Replicas that had not terminated when the grace period ended.
        stuck: Vec<String>,
    },

    /// Queue wiring was rejected while building the drain plan.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A worker group could not be validated, created or started.
    #[error(transparent)]
    Group(#[from] WorkerGroupError),

    /// The orchestrator was built outside of a tokio runtime.
    #[error("no tokio runtime available to drive the orchestrator")]
    NoRuntime,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use flightvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Pipeline(_) => "runtime_pipeline_rejected",
            RuntimeError::Group(e) => e.as_label(),
            RuntimeError::NoRuntime => "runtime_missing",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck replicas={stuck:?}")
            }
            other => other.to_string(),
        }
    }

    /// True for failures that happen before any replica is spawned.
    pub fn is_setup(&self) -> bool {
        !matches!(self, RuntimeError::GraceExceeded { .. })
    }
}

/// # Errors produced while describing or managing a worker group.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerGroupError {
    /// `replica_count` must be at least one.
    #[error("group '{group}': replica count must be >= 1")]
    InvalidReplicaCount {
        /// Group name.
        group: String,
    },

    /// Groups are addressed by name in logs and events.
    #[error("group name must not be empty")]
    EmptyName,

    /// One queue was declared as both input and output of the same group.
    #[error("group '{group}': queue '{queue}' is wired as both input and output")]
    QueueWiredBothWays {
        /// Group name.
        group: String,
        /// Offending queue name.
        queue: String,
    },

    /// Replicas need a tokio runtime to be spawned on.
    #[error("group '{group}': no tokio runtime available to spawn replicas")]
    NoRuntime {
        /// Group name.
        group: String,
    },

    /// A joined group cannot be started again; build a fresh one.
    #[error("group '{group}' was already joined and cannot be restarted")]
    AlreadyJoined {
        /// Group name.
        group: String,
    },

    /// Two groups with the same name were registered with one orchestrator.
    #[error("group '{group}' is already registered")]
    DuplicateGroup {
        /// Group name.
        group: String,
    },
}

impl WorkerGroupError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerGroupError::InvalidReplicaCount { .. } => "group_invalid_replica_count",
            WorkerGroupError::EmptyName => "group_empty_name",
            WorkerGroupError::QueueWiredBothWays { .. } => "group_queue_wired_both_ways",
            WorkerGroupError::NoRuntime { .. } => "group_no_runtime",
            WorkerGroupError::AlreadyJoined { .. } => "group_already_joined",
            WorkerGroupError::DuplicateGroup { .. } => "group_duplicate",
        }
    }
}

/// # Errors produced while deriving the drain order.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The group graph contains a cycle, so no end-to-start drain order exists.
    #[error("queue wiring forms a cycle through '{group}'")]
    Cycle {
        /// A node that participates in the cycle.
        group: String,
    },
}

/// # Errors produced by a replica's unit of work.
///
/// `Fail` is logged by the worker and the loop continues. `Fatal` ends the
/// replica early; the group reports it as failed and never restarts it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The unit of work failed; the next iteration may succeed.
    #[error("work failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The replica cannot continue (e.g. its role object could not be created).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl WorkError {
    /// Shorthand for [`WorkError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        WorkError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`WorkError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        WorkError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use flightvisor::WorkError;
    ///
    /// assert_eq!(WorkError::fail("send").as_label(), "work_failed");
    /// assert_eq!(WorkError::fatal("init").as_label(), "work_fatal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Fail { .. } => "work_failed",
            WorkError::Fatal { .. } => "work_fatal",
        }
    }

    /// Indicates whether the replica must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkError::Fatal { .. })
    }
}

/// # Errors reported by a [`FlightLink`](crate::link::FlightLink).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The underlying connection is gone.
    #[error("link disconnected")]
    Disconnected,

    /// A fire-and-forget send could not be handed to the link.
    #[error("send failed: {reason}")]
    Send {
        /// Link-specific reason.
        reason: String,
    },

    /// Receiving failed for a reason other than a timeout.
    #[error("receive failed: {reason}")]
    Receive {
        /// Link-specific reason.
        reason: String,
    },
}

impl From<LinkError> for WorkError {
    fn from(err: LinkError) -> Self {
        WorkError::fail(err.to_string())
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read '{path}': {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`Config`](crate::Config).
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid(_) => "config_invalid",
        }
    }
}
