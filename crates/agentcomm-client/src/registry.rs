use std::collections::HashMap;
use std::sync::RwLock;

use agentcomm_types::Agent;

/// Read-only agent lookup, implemented by the external registry.
pub trait AgentRegistry: Send + Sync {
    fn get_agent(&self, agent_id: &str) -> Option<Agent>;
}

/// Simple in-memory registry, used by tests and small deployments.
#[derive(Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<HashMap<String, Agent>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: Agent) {
        self.agents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(agent.id.clone(), agent);
    }
}

impl AgentRegistry for InMemoryAgentRegistry {
    fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.agents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(agent_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let registry = InMemoryAgentRegistry::new();
        registry.insert(Agent::new("echo", "http://localhost:3000"));

        assert!(registry.get_agent("echo").is_some());
        assert!(registry.get_agent("ghost").is_none());
    }
}
