//! # EnvironmentStore
//!
//! ## Rules
//! - The local map is updated before any sink is called.
//! - Sinks are called one after the other, each bounded by `sink_timeout`.
//! - A failing sink is logged and reported; the remaining sinks are still called.
//! - Setting a variable to its current value is propagated like any other change.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{EnvironmentMap, EnvironmentSink, filter};
use crate::error::PropagationError;
use crate::events::{Bus, Event, EventKind};

/// Owner of the session environment.
pub struct EnvironmentStore {
    map: EnvironmentMap,
    sinks: Vec<Arc<dyn EnvironmentSink>>,
    sink_timeout: Duration,
    bus: Bus,
}

impl EnvironmentStore {
    /// Creates a store seeded with `initial` and no sinks.
    pub fn new(initial: EnvironmentMap, sink_timeout: Duration, bus: Bus) -> Self {
        Self {
            map: initial,
            sinks: Vec::new(),
            sink_timeout,
            bus,
        }
    }

    /// Registers a sink. It receives the map on the next change or [`resync`](Self::resync).
    pub fn add_sink(&mut self, sink: Arc<dyn EnvironmentSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Borrow of the unfiltered local map.
    pub fn as_map(&self) -> &EnvironmentMap {
        &self.map
    }

    /// Owned copy of the unfiltered local map.
    pub fn snapshot(&self) -> EnvironmentMap {
        self.map.clone()
    }

    /// Sets `key` to `value` and propagates the full map.
    ///
    /// Returns the propagation failures (already logged and published).
    pub async fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Vec<PropagationError> {
        let key = key.into();
        self.map.insert(key.clone(), value.into());
        self.bus
            .publish(Event::new(EventKind::EnvironmentSet).with_key(key));
        self.propagate().await
    }

    /// Removes `key` and propagates the full map.
    pub async fn unset(&mut self, key: &str) -> Vec<PropagationError> {
        self.map.remove(key);
        self.bus
            .publish(Event::new(EventKind::EnvironmentUnset).with_key(key));
        self.propagate().await
    }

    /// Pushes the current map to every sink without changing it.
    pub async fn resync(&self) -> Vec<PropagationError> {
        self.propagate().await
    }

    async fn propagate(&self) -> Vec<PropagationError> {
        let exported = filter::exportable(&self.map);
        let mut failures = Vec::new();

        for sink in &self.sinks {
            let err = match tokio::time::timeout(self.sink_timeout, sink.push(&exported)).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => PropagationError::Rejected {
                    sink: sink.name().to_string(),
                    error: e.to_string(),
                },
                Err(_elapsed) => PropagationError::Timeout {
                    sink: sink.name().to_string(),
                    timeout: self.sink_timeout,
                },
            };
            warn!(sink = sink.name(), error = %err, "environment propagation failed");
            self.bus.publish(
                Event::new(EventKind::PropagationFailed)
                    .with_sink(err.sink())
                    .with_reason(err.as_label()),
            );
            failures.push(err);
        }
        failures
    }
}
