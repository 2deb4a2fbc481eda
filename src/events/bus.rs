//! # Session event bus.
//!
//! [`Bus`] carries every [`Event`] of one session. Publishing is
//! synchronous and never waits, so the control loop and the process watchdogs
//! can report from anywhere.
//!
//! ```text
//! Orchestrator ─────┐
//! watchdogs ────────┤
//! EnvironmentStore ─┼─► Bus (ring buffer) ─► listener ─► SubscriberSet
//! SessionInterface ─┘                      └► test receivers
//! ```
//!
//! A receiver that falls behind by more than the capacity gets
//! `RecvError::Lagged` and loses the oldest events. Events published while
//! nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Shared handle to the session's broadcast channel. Clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Bus keeping at most `capacity` undelivered events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscriber_sees_events_published_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ModuleStarting));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ModuleRunning).with_module("locale"));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::ModuleRunning);
        assert_eq!(ev.module.as_deref(), Some("locale"));
    }
}
