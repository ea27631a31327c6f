//! # Subscriber trait.
//!
//! A [`Subscribe`] implementation observes the orchestrator's lifecycle
//! events (replica transitions, drain progress, grace outcome) without
//! sitting on any replica's path.
//!
//! ```text
//! listener ──emit──► [per-subscriber queue] ──► on_event(&Event)
//!                          │ full                     │ panic
//!                          ▼                          ▼
//!                 SubscriberOverflow          SubscriberPanicked
//! ```
//!
//! Delivery is FIFO per subscriber. A full queue loses the event for that
//! subscriber only.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use async_trait::async_trait;
//! use flightvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct DroppedItems(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for DroppedItems {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ItemDropped {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "dropped-items"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Lifecycle event observer.
///
/// `on_event` runs on the subscriber's own task; it should not block the
/// executor and should not panic (a panic is caught and reported).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
