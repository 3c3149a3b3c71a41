use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use super::{Orchestrator, OrchestratorError};
use crate::types::{CharmDescriptor, DeployOutcome, RelationEdge};

/// Orchestrator kept entirely in memory. Used by `simulate` and by tests.
///
/// Deploying a service starts its agent unless `auto_start` is off. A service
/// with unmet requirements is deferred until every requirement is deployed.
/// Peers marked not-ready reject every relation that touches them.
#[derive(Clone)]
pub struct InMemoryOrchestrator {
    services: Arc<RwLock<Vec<String>>>,
    started_agents: Arc<RwLock<HashSet<String>>>,
    requirements: Arc<RwLock<HashMap<String, Vec<String>>>>,
    not_ready: Arc<RwLock<HashSet<String>>>,
    relations: Arc<RwLock<Vec<RelationEdge>>>,
    relation_calls: Arc<RwLock<Vec<RelationEdge>>>,
    wait_calls: Arc<RwLock<Vec<Vec<String>>>>,
    auto_start: bool,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(Vec::new())),
            started_agents: Arc::new(RwLock::new(HashSet::new())),
            requirements: Arc::new(RwLock::new(HashMap::new())),
            not_ready: Arc::new(RwLock::new(HashSet::new())),
            relations: Arc::new(RwLock::new(Vec::new())),
            relation_calls: Arc::new(RwLock::new(Vec::new())),
            wait_calls: Arc::new(RwLock::new(Vec::new())),
            auto_start: true,
        }
    }

    pub fn without_auto_start(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// Registers an already running service, as found on an existing model.
    pub fn with_service(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.start_agent(&name);
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name);
        self
    }

    pub fn require(&self, service: impl Into<String>, dependency: impl Into<String>) {
        self.requirements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(service.into())
            .or_default()
            .push(dependency.into());
    }

    pub fn start_agent(&self, name: &str) {
        self.started_agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    pub fn set_not_ready(&self, peer: &str) {
        self.not_ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.to_string());
    }

    pub fn set_ready(&self, peer: &str) {
        self.not_ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer);
    }

    /// Relations that were accepted, deduplicated.
    pub fn relations(&self) -> Vec<RelationEdge> {
        self.relations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every `add_relation` call in order, including rejected ones.
    pub fn relation_calls(&self) -> Vec<RelationEdge> {
        self.relation_calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn wait_calls(&self) -> Vec<Vec<String>> {
        self.wait_calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn services(&self) -> Vec<String> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for InMemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn wait_for_agents(&self, names: &[String]) -> Result<bool, OrchestratorError> {
        self.wait_calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(names.to_vec());

        let started = self
            .started_agents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(names.iter().all(|name| started.contains(name)))
    }

    async fn add_relation(&self, edge: &RelationEdge) -> Result<String, OrchestratorError> {
        self.relation_calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(edge.clone());

        {
            let not_ready = self.not_ready.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(peer) = [edge.local(), edge.remote()]
                .into_iter()
                .find(|endpoint| not_ready.contains(&endpoint.component))
            {
                return Err(OrchestratorError::PeerNotReady {
                    peer: peer.component.clone(),
                });
            }
        }

        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        for endpoint in [edge.local(), edge.remote()] {
            if !services.contains(&endpoint.component) {
                return Err(OrchestratorError::UnknownService(endpoint.component.clone()));
            }
        }

        let mut relations = self.relations.write().unwrap_or_else(PoisonError::into_inner);
        if !relations.contains(edge) {
            relations.push(edge.clone());
        }
        Ok(format!("related {}", edge))
    }

    async fn deployed_services(&self) -> Result<Vec<String>, OrchestratorError> {
        Ok(self.services())
    }

    async fn deploy(&self, charm: &CharmDescriptor) -> Result<DeployOutcome, OrchestratorError> {
        let missing: Vec<String> = {
            let requirements = self
                .requirements
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
            requirements
                .get(&charm.name)
                .map(|deps| {
                    deps.iter()
                        .filter(|dep| !services.contains(dep))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if !missing.is_empty() {
            return Ok(DeployOutcome::Deferred(format!(
                "waiting for {}",
                missing.join(", ")
            )));
        }

        {
            let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
            if !services.contains(&charm.name) {
                services.push(charm.name.clone());
            }
        }
        if self.auto_start {
            self.start_agent(&charm.name);
        }
        Ok(DeployOutcome::Issued)
    }
}
