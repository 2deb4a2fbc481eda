use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{backend::InitSystem, orchestrator::Orchestrator};
use crate::{
    config::SessionConfig,
    environment::{EnvironmentMap, EnvironmentSink, EnvironmentStore, defaults},
    events::{Bus, EventKind},
    registry::PluginRegistry,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`Orchestrator`] with optional collaborators.
pub struct OrchestratorBuilder {
    cfg: SessionConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    registry: Option<PluginRegistry>,
    sinks: Vec<Arc<dyn EnvironmentSink>>,
    init: Option<Arc<dyn InitSystem>>,
    environment: Option<EnvironmentMap>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            registry: None,
            sinks: Vec::new(),
            init: None,
            environment: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (module transitions, process
    /// supervision, environment changes) through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `registry` instead of the one derived from the configuration.
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds an environment sink.
    pub fn with_sink(mut self, sink: Arc<dyn EnvironmentSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Provides the init system (required for delegated mode).
    pub fn with_init_system(mut self, init: Arc<dyn InitSystem>) -> Self {
        self.init = Some(init);
        self
    }

    /// Seeds the session environment.
    ///
    /// Without it, the inherited process environment plus the session
    /// defaults is used.
    pub fn with_environment(mut self, environment: EnvironmentMap) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Must be called from within a tokio runtime when subscribers are set.
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let subscribers = if self.subscribers.is_empty() {
            None
        } else {
            let set = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            let listener = subscriber_listener(&bus, Arc::clone(&set));
            Some((set, listener))
        };

        let initial = self.environment.unwrap_or_else(|| {
            let mut env = defaults::inherited();
            defaults::apply(&mut env, &self.cfg.desktop);
            env
        });
        let mut environment = EnvironmentStore::new(initial, self.cfg.sink_timeout, bus.clone());
        for sink in self.sinks {
            environment.add_sink(sink);
        }

        let registry = self
            .registry
            .unwrap_or_else(|| PluginRegistry::for_config(&self.cfg));

        Orchestrator::new_internal(self.cfg, bus, registry, environment, self.init, subscribers)
    }
}

/// Forwards bus events to the subscriber set until the session has ended.
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    set.emit(&ev);
                    if ev.kind == EventKind::SessionEnded {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}
