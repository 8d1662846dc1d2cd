//! The process-wide shared resources named in the concurrency model: an
//! agent registry keyed by name, and the [`StreamBroker`] used to fan
//! streaming chunks out across a workflow boundary.
//!
//! Both are held behind `Arc` and meant to be constructed once per process
//! and cloned into every workflow handler / ingress task that needs them.
//! The registry itself is guarded by a reader-writer lock, matching the
//! concurrency model's "concurrent readers/writers ... guarded by a
//! reader-writer lock (registry) and a concurrent map (broker)".

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::agent::Agent;
use crate::broker::{InMemoryStreamBroker, StreamBroker};

/// A process-wide map from agent name to the registered [`Agent`] instance,
/// consulted by workflow handlers to reconstruct the agent for an incoming
/// run id.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
}

impl AgentRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh registry in an `Arc`, the shape this is meant to be
    /// shared in.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `agent` under its own name, replacing any prior entry with
    /// the same name.
    pub async fn register(&self, agent: Arc<Agent>) {
        let name = agent.name().to_string();
        self.agents.write().await.insert(name, agent);
    }

    /// Remove the entry for `name`, if any.
    pub async fn unregister(&self, name: &str) {
        self.agents.write().await.remove(name);
    }

    /// Look up the agent registered under `name`.
    #[must_use = "the lookup result must be used or the call has no effect"]
    pub async fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.read().await.get(name).cloned()
    }

    /// Names of every currently registered agent.
    pub async fn names(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }
}

/// The two process-wide resources a durable runtime strategy needs,
/// bundled together since they are always constructed and shared as a
/// pair.
pub struct SharedResources {
    /// The agent registry.
    pub agents: Arc<AgentRegistry>,
    /// The cross-process streaming broker.
    pub broker: Arc<dyn StreamBroker>,
}

impl SharedResources {
    /// Build a fresh pair: an empty registry and an in-memory broker with
    /// the given per-run channel capacity.
    #[must_use]
    pub fn new(broker_capacity: usize) -> Self {
        Self {
            agents: AgentRegistry::shared(),
            broker: InMemoryStreamBroker::shared(broker_capacity),
        }
    }
}

impl Default for SharedResources {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::AgentRegistry;
    use crate::agent::{Agent, AgentConfig};
    use crate::testing::MockLlm;
    use std::sync::Arc;

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let registry = AgentRegistry::new();
        let config = AgentConfig::builder("greeter", Arc::new(MockLlm::empty())).build();
        let agent = Arc::new(Agent::new(config));

        registry.register(Arc::clone(&agent)).await;
        assert!(registry.get("greeter").await.is_some());
        assert_eq!(registry.names().await, vec!["greeter".to_string()]);

        registry.unregister("greeter").await;
        assert!(registry.get("greeter").await.is_none());
    }
}
