//! # Orchestrator configuration.
//!
//! [`OrchestratorConfig`] holds the settings the shutdown protocol needs.
//! The flight-level [`Config`](crate::Config) derives one via
//! [`Config::orchestrator`](crate::Config::orchestrator).
//!
//! ## Sentinel values
//! - `grace = 0s` → join waits for every replica without a deadline
//! - `poll = 0s` → replaced by [`DEFAULT_POLL_TIMEOUT`]

use std::time::Duration;

use crate::group::DEFAULT_POLL_TIMEOUT;

/// Settings of the drain/join protocol.
///
/// ## Field semantics
/// - `poll`: short timeout used by `fill_and_drain` (`0s` = default)
/// - `grace`: maximum wait for replicas to terminate after the drain (`0s` = no limit)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Poll timeout for the shutdown drain.
    pub poll: Duration,

    /// Join grace period.
    ///
    /// When it elapses, the replicas still running are aborted and shutdown
    /// returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl OrchestratorConfig {
    /// Returns the drain poll timeout, never zero.
    #[inline]
    pub fn drain_poll(&self) -> Duration {
        if self.poll.is_zero() {
            DEFAULT_POLL_TIMEOUT
        } else {
            self.poll
        }
    }

    /// Returns the join grace as an `Option`.
    ///
    /// - `None` → wait for every replica without a deadline
    /// - `Some(d)` → abort what is still running after `d`
    #[inline]
    pub fn join_grace(&self) -> Option<Duration> {
        if self.grace.is_zero() {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for OrchestratorConfig {
    /// Default configuration:
    ///
    /// - `poll = 100ms`
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            poll: DEFAULT_POLL_TIMEOUT,
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
        }
    }
}
