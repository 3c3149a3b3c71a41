use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RelationEdge;

/// Static description of a deployable charm.
///
/// Built once at startup and never mutated. The relation table maps a peer
/// charm name to the edge handed to the orchestrator; whether those peers are
/// actually managed is checked by the registry, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmDescriptor {
    pub name: String,
    pub display_name: String,
    pub revision: u32,
    pub deploy_priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationEdge>,
}

fn default_enabled() -> bool {
    true
}

impl CharmDescriptor {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        revision: u32,
        deploy_priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            revision,
            deploy_priority,
            enabled: true,
            relations: BTreeMap::new(),
        }
    }

    pub fn with_relation(mut self, peer: impl Into<String>, edge: RelationEdge) -> Self {
        self.relations.insert(peer.into(), edge);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Agents that must be running before relations are attempted: this
    /// charm first, then every peer.
    pub fn agents_to_wait_for(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.relations.keys().cloned())
            .collect()
    }
}
