//! # Worker groups.
//!
//! A group is one role run by `replica_count` identical replicas.
//!
//! - [`WorkerProperties`] is the validated, immutable descriptor: replica
//!   count, entry point, static arguments, queue wiring, controller.
//! - [`WorkerManager`] owns the replicas of one descriptor and exposes the
//!   `start_workers` / `join_workers` lifecycle.
//!
//! ```text
//! WorkerProperties::create(..) ──► WorkerManager::create(props, bus)
//!                                         │ start_workers()
//!                                         ▼
//!                      JoinSet ─► replica #0 … replica #N-1
//!                                   entry_point(args.clone(), ctx)
//!                                         │ join_workers()
//!                                         ▼
//!                                    JoinReport
//! ```

mod manager;
mod properties;
mod replica;

pub use manager::{GroupState, JoinReport, WorkerManager};
pub use properties::{DEFAULT_POLL_TIMEOUT, WorkerProperties};
pub use replica::{ReplicaId, ReplicaState};

pub(crate) use replica::panic_message;
