//! # Fan-out to subscribers.
//!
//! ```text
//! emit(&Event) ── accepts? ──► try_send ──► [queue] ──► worker ──► on_event()
//!                                  │                        └─ panic ─► SubscriberPanicked
//!                                  └─ full / closed ─► SubscriberOverflow
//! ```
//!
//! `emit` never awaits. Order is FIFO per subscriber and unspecified across
//! subscribers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Slot {
    subscriber: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Subscribers of one session, each behind its own queue and worker.
pub struct SubscriberSet {
    slots: Vec<Slot>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Needs a tokio runtime.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (slots, workers): (Vec<Slot>, Vec<JoinHandle<()>>) = subscribers
            .into_iter()
            .map(|subscriber| {
                let (queue, rx) = mpsc::channel(subscriber.queue_capacity().max(1));
                let worker = tokio::spawn(drain(Arc::clone(&subscriber), rx, bus.clone()));
                (Slot { subscriber, queue }, worker)
            })
            .unzip();
        Self {
            slots,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that accepts it.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for slot in self.slots.iter().filter(|s| s.subscriber.accepts(event)) {
            let reason = match slot.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            // Reporting an overflow of an overflow report would loop.
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(slot.subscriber.name(), reason));
            }
        }
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the set has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Closes every queue and waits until the workers have handled what was queued.
    pub async fn shutdown(self) {
        drop(self.slots);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn drain(subscriber: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(event) = rx.recv().await {
        let handled = AssertUnwindSafe(subscriber.on_event(&event)).catch_unwind().await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(
                subscriber.name(),
                panic_message(payload.as_ref()),
            ));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Collect(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.0.lock().expect("lock").push(event.kind);
        }
        fn accepts(&self, event: &Event) -> bool {
            event.kind != EventKind::EnvironmentSet
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn delivers_accepted_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(vec![Arc::new(Collect(seen.clone()))], Bus::new(16));

        set.emit(&Event::new(EventKind::ModuleStarting));
        set.emit(&Event::new(EventKind::EnvironmentSet));
        set.emit(&Event::new(EventKind::ModuleRunning));
        set.shutdown().await;

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![EventKind::ModuleStarting, EventKind::ModuleRunning]
        );
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported_on_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Explode)], bus.clone());

        set.emit(&Event::new(EventKind::SessionEnded));

        let ev = rx.recv().await.expect("panic report");
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.module.as_deref(), Some("explode"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        set.shutdown().await;
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(text.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
