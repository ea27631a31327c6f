//! # Worker contract.
//!
//! Every entry point implements the same cooperative loop so that the
//! shutdown drain can always unblock it:
//!
//! ```text
//! while ctx.running().await {          // exit check + check_pause
//!     let Some(item) = ctx.recv().await else { continue };   // short timeout
//!     if let Some(out) = unit_of_work(item) {
//!         ctx.send(out).await;         // bounded put, drop-and-log on failure
//!     }
//! }
//! ```
//!
//! Blocking indefinitely anywhere in this loop (I/O without a timeout, an
//! unbounded put) breaks the shutdown guarantee.

mod context;
mod worker;

pub use context::{SEND_ATTEMPTS, WorkerContext};
pub use worker::{BoxWorkFuture, Worker, WorkerRef};
