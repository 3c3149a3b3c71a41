use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named endpoint of a charm, written `component:interface`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    pub component: String,
    pub interface: String,
}

impl Endpoint {
    pub fn new(component: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            interface: interface.into(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(component), Some(interface), None)
                if !component.is_empty() && !interface.is_empty() =>
            {
                Ok(Self::new(component, interface))
            }
            _ => Err(anyhow!(
                "Invalid endpoint '{}': expected 'component:interface'",
                s
            )),
        }
    }
}

impl TryFrom<String> for Endpoint {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component, self.interface)
    }
}

/// The pair of endpoints handed to the orchestrator when adding a relation.
/// Serialised as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEdge(pub Endpoint, pub Endpoint);

impl RelationEdge {
    /// Builds an edge from two `component:interface` strings.
    pub fn parse(local: &str, remote: &str) -> Result<Self> {
        Ok(Self(local.parse()?, remote.parse()?))
    }

    pub fn local(&self) -> &Endpoint {
        &self.0
    }

    pub fn remote(&self) -> &Endpoint {
        &self.1
    }

    /// True when either side of the edge belongs to `component`.
    pub fn touches(&self, component: &str) -> bool {
        self.0.component == component || self.1.component == component
    }
}

impl fmt::Display for RelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.0, self.1)
    }
}

/// How a relation pass reacts to a failed `add_relation` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationPolicy {
    /// Stop at the first failure; remaining peers wait for the next pass.
    AbortOnFailure,
    /// Attempt every peer and report each result.
    #[default]
    ContinueOnFailure,
}

impl RelationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationPolicy::AbortOnFailure => "abort_on_failure",
            RelationPolicy::ContinueOnFailure => "continue_on_failure",
        }
    }
}

impl FromStr for RelationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "abort_on_failure" | "abort" => Ok(RelationPolicy::AbortOnFailure),
            "continue_on_failure" | "continue" => Ok(RelationPolicy::ContinueOnFailure),
            other => Err(anyhow!("Unknown relation policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelationStatus {
    Added { response: String },
    Failed { error: String },
    /// Not attempted because an earlier peer failed under `AbortOnFailure`.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOutcome {
    pub peer: String,
    pub edge: RelationEdge,
    pub status: RelationStatus,
    pub timestamp: DateTime<Utc>,
}

impl RelationOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self.status, RelationStatus::Added { .. })
    }
}

/// Result of one `set_relations` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationPass {
    pub charm: String,
    pub agents_ready: bool,
    pub outcomes: Vec<RelationOutcome>,
}

impl RelationPass {
    pub fn not_ready(charm: impl Into<String>) -> Self {
        Self {
            charm: charm.into(),
            agents_ready: false,
            outcomes: Vec::new(),
        }
    }

    /// The "retry me later" signal the installer loop acts on.
    pub fn needs_retry(&self) -> bool {
        !self.agents_ready || self.outcomes.iter().any(|o| !o.is_added())
    }

    pub fn is_complete(&self) -> bool {
        !self.needs_retry()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, RelationStatus::Skipped))
            .count()
    }

    pub fn failed_peers(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RelationStatus::Failed { .. }))
            .map(|o| o.peer.as_str())
            .collect()
    }
}
