pub mod memory;

pub use memory::InMemoryOrchestrator;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CharmDescriptor, DeployOutcome, RelationEdge};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{peer} not ready for relation")]
    PeerNotReady { peer: String },

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("orchestrator API error: {0}")]
    Api(String),
}

/// The host orchestrator as seen by charm descriptors.
///
/// Whether `wait_for_agents` polls or answers immediately is up to the
/// implementation. `add_relation` is expected to be idempotent.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn wait_for_agents(&self, names: &[String]) -> Result<bool, OrchestratorError>;

    async fn add_relation(&self, edge: &RelationEdge) -> Result<String, OrchestratorError>;

    async fn deployed_services(&self) -> Result<Vec<String>, OrchestratorError>;

    async fn deploy(&self, charm: &CharmDescriptor) -> Result<DeployOutcome, OrchestratorError>;
}
