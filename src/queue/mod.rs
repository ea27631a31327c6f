//! Bounded queues handing items between worker groups.
//!
//! A [`BoundedQueue`] is a capacity-limited FIFO shared by its producers and
//! consumers. Every blocking operation takes an explicit timeout: a timed-out
//! `get` returns the empty marker (`None`) so the caller loops back to its
//! exit check. That timeout-driven retry is the only cancellation mechanism
//! in the system.
//!
//! ```text
//! producer ──put(item, t)──► [ Mutex<VecDeque> ] ──get(t)──► consumer
//!     ▲        not_full        capacity C (0 = ∞)   not_empty      │
//!     └──── Notify ◄──────────────────┴───────────────► Notify ────┘
//! ```
//!
//! [`Drain`] erases the item type so the orchestrator can run the shutdown
//! drain over heterogeneous queues.

mod bounded;
mod drain;

pub use bounded::{BoundedQueue, QueueId};
pub use drain::{Drain, QueueRef};
