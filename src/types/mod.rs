pub mod charm;
pub mod relation;

pub use charm::CharmDescriptor;
pub use relation::{
    Endpoint, RelationEdge, RelationOutcome, RelationPass, RelationPolicy, RelationStatus,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharmState {
    Pending,   // Registered, not yet issued
    Deploying, // Deploy issued
    Deferred,  // Waiting on another service
    Deployed,  // Units placed, agents may still be starting
    Relating,  // Relations being set
    Ready,     // Deployed and fully related
    Skipped,   // Disabled descriptor
}

impl CharmState {
    pub fn as_str(&self) -> &str {
        match self {
            CharmState::Pending => "Pending",
            CharmState::Deploying => "Deploying",
            CharmState::Deferred => "Deferred",
            CharmState::Deployed => "Deployed",
            CharmState::Relating => "Relating",
            CharmState::Ready => "Ready",
            CharmState::Skipped => "Skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CharmState::Ready | CharmState::Skipped)
    }
}

/// What the orchestrator reports back for a single deploy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployOutcome {
    Issued,
    /// Waiting for another service; try again later.
    Deferred(String),
}
