//! # Worker entry points.
//!
//! A [`Worker`] is the entry point every replica of a group runs. It receives
//! its own clone of the group's static arguments and a [`WorkerContext`], and
//! returns once it observed exit (or hit a fatal error).
//!
//! Any `Fn(A, WorkerContext<I, O>) -> impl Future` closure or `async fn`
//! is a worker, so role code rarely implements the trait by hand:
//!
//! ```rust
//! use flightvisor::{WorkError, WorkerContext, WorkerRef};
//! use std::sync::Arc;
//!
//! async fn doubler(_: (), ctx: WorkerContext<u32, u32>) -> Result<(), WorkError> {
//!     while ctx.running().await {
//!         let Some(n) = ctx.recv().await else { continue };
//!         ctx.send(n * 2).await;
//!     }
//!     Ok(())
//! }
//!
//! let w: WorkerRef<(), u32, u32> = Arc::new(doubler);
//! # let _ = w;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::WorkError;
use crate::workers::WorkerContext;

/// Boxed future returned by [`Worker::spawn`].
pub type BoxWorkFuture = Pin<Box<dyn Future<Output = Result<(), WorkError>> + Send + 'static>>;

/// Shared handle to a worker entry point.
pub type WorkerRef<A, I, O> = Arc<dyn Worker<A, I, O>>;

/// # Replica entry point.
///
/// `spawn` creates a **fresh** future per replica; state shared between
/// replicas must be wrapped in `Arc` inside the arguments explicitly.
pub trait Worker<A, I, O>: Send + Sync + 'static {
    /// Creates the future driving one replica.
    fn spawn(&self, args: A, ctx: WorkerContext<I, O>) -> BoxWorkFuture;
}

impl<A, I, O, F, Fut> Worker<A, I, O> for F
where
    F: Fn(A, WorkerContext<I, O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    fn spawn(&self, args: A, ctx: WorkerContext<I, O>) -> BoxWorkFuture {
        Box::pin((self)(args, ctx))
    }
}
