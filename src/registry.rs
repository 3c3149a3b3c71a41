use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::CharmDescriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("charm '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid charm name '{0}'")]
    InvalidName(String),

    #[error("relations reference unmanaged charms: {}", format_edges(.0))]
    MissingPeers(Vec<(String, String)>),

    #[error("relations reference disabled charms: {}", format_edges(.0))]
    DisabledPeers(Vec<(String, String)>),
}

fn format_edges(edges: &[(String, String)]) -> String {
    edges
        .iter()
        .map(|(charm, peer)| format!("{} -> {}", charm, peer))
        .collect::<Vec<_>>()
        .join(", ")
}

fn charm_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("static pattern"))
}

/// Every charm the installer manages, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CharmRegistry {
    charms: BTreeMap<String, CharmDescriptor>,
}

impl CharmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_charms(
        charms: impl IntoIterator<Item = CharmDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for charm in charms {
            registry.register(charm)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, charm: CharmDescriptor) -> Result<(), RegistryError> {
        if !charm_name_pattern().is_match(&charm.name) {
            return Err(RegistryError::InvalidName(charm.name));
        }
        if self.charms.contains_key(&charm.name) {
            return Err(RegistryError::Duplicate(charm.name));
        }
        self.charms.insert(charm.name.clone(), charm);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CharmDescriptor> {
        self.charms.get(name)
    }

    pub fn len(&self) -> usize {
        self.charms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charms.is_empty()
    }

    /// Checks that every relation of an enabled charm points at a registered,
    /// enabled charm. Unregistered peers are reported before disabled ones;
    /// each error lists all offenders at once.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut missing = Vec::new();
        let mut disabled = Vec::new();

        for charm in self.charms.values().filter(|c| c.enabled) {
            for peer in charm.peers() {
                match self.charms.get(peer) {
                    None => missing.push((charm.name.clone(), peer.to_string())),
                    Some(p) if !p.enabled => {
                        disabled.push((charm.name.clone(), peer.to_string()))
                    }
                    Some(_) => {}
                }
            }
        }

        if !missing.is_empty() {
            Err(RegistryError::MissingPeers(missing))
        } else if !disabled.is_empty() {
            Err(RegistryError::DisabledPeers(disabled))
        } else {
            Ok(())
        }
    }

    /// Enabled charms, lowest priority first; ties broken by name.
    pub fn deploy_order(&self) -> Vec<&CharmDescriptor> {
        let mut order: Vec<&CharmDescriptor> = self.charms.values().filter(|c| c.enabled).collect();
        order.sort_by(|a, b| {
            a.deploy_priority
                .cmp(&b.deploy_priority)
                .then_with(|| a.name.cmp(&b.name))
        });
        order
    }

    pub fn disabled(&self) -> Vec<&CharmDescriptor> {
        self.charms.values().filter(|c| !c.enabled).collect()
    }

    /// Registers a bare descriptor for every relation peer that has none, so
    /// a partial registry can still be exercised. Placeholders deploy first.
    pub fn add_placeholders_for_missing_peers(&mut self) -> Vec<String> {
        let missing: BTreeSet<String> = self
            .charms
            .values()
            .filter(|c| c.enabled)
            .flat_map(|c| c.peers().map(str::to_string).collect::<Vec<_>>())
            .filter(|peer| !self.charms.contains_key(peer))
            .collect();

        for peer in &missing {
            log::warn!("No descriptor for {}, using a placeholder", peer);
            self.charms
                .insert(peer.clone(), CharmDescriptor::new(peer.clone(), peer.clone(), 0, 0));
        }
        missing.into_iter().collect()
    }

    /// Registers every `*.yaml` / `*.yml` descriptor in `dir`. Returns the
    /// number of charms added.
    pub fn load_plugin_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read charm plugin dir {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in &paths {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let charm: CharmDescriptor = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid charm descriptor in {}", path.display()))?;
            log::debug!("Loaded charm {} from {}", charm.name, path.display());
            self.register(charm)
                .with_context(|| format!("Failed to register charm from {}", path.display()))?;
        }

        Ok(paths.len())
    }
}
