//! Exit and pause signalling shared by every replica of a run.
//!
//! The [`Controller`] holds two independent flags:
//! - **exit**: monotonic within a run; once set, every replica observes it at
//!   its next poll point and leaves its loop.
//! - **pause**: toggled by the orchestrator; replicas park inside
//!   [`Controller::check_pause`] until it is cleared or exit is requested.
//!
//! ```text
//! Orchestrator ──request_exit()/request_pause()──► Controller (watch cell)
//!                                                        │
//!                          ┌─────────────────────────────┼──────────────┐
//!                          ▼                             ▼              ▼
//!                    replica #0                    replica #1  ...  replica #N
//!            is_exit_requested() / check_pause()
//! ```

mod core;

pub use core::Controller;
