//! # Event subscribers for the orchestrator.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out and the built-in [`LogWriter`].
//!
//! ```text
//! Event flow:
//!   replica ── publish(Event) ──► Bus ──► orchestrator listener
//!                                              │
//!                                              ├──► SubscriberSet::emit(&Event)
//!                                              │         │
//!                                              │    ┌────┴────┬─────────┐
//!                                              │    ▼         ▼         ▼
//!                                              │  LogWriter  Custom    ...
//!                                              │
//!                                              └──► AliveTracker (replica states)
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
