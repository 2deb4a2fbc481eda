//! # Subscriber trait.
//!
//! A [`Subscribe`] implementor observes the session: module transitions,
//! process supervision, environment propagation, lock state.
//!
//! Delivery never blocks the control loop. Each subscriber owns a bounded
//! queue drained by its own worker; when the queue is full the event is
//! dropped for that subscriber alone and a `SubscriberOverflow` is published.
//! A panic in `on_event` is caught and published as `SubscriberPanicked`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use sessionvisor::{Event, EventKind, Subscribe};
//!
//! struct CrashCounter(std::sync::atomic::AtomicU32);
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!     }
//!
//!     fn accepts(&self, ev: &Event) -> bool {
//!         ev.kind == EventKind::ProcessCrashed
//!     }
//!
//!     fn name(&self) -> &'static str { "crash-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Session event observer.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event, on the subscriber's own worker task.
    async fn on_event(&self, event: &Event);

    /// Filters events before they are queued. Rejected events cost no queue slot.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    /// Name reported in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue length for this subscriber (at least 1).
    fn queue_capacity(&self) -> usize {
        256
    }
}
