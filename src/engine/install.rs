use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::deploy::DeployQueue;
use super::watcher::RelationWatcher;
use super::ProgressBook;
use crate::config::Config;
use crate::lifecycle::{CharmProgress, CharmStateMachine, LifecycleEvent};
use crate::orchestrator::Orchestrator;
use crate::registry::CharmRegistry;
use crate::types::{CharmState, RelationPass};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub progress: ProgressBook,
    pub relation_passes: Vec<RelationPass>,
}

impl InstallReport {
    pub fn is_ready(&self) -> bool {
        self.progress.values().all(|p| p.state.is_terminal())
    }

    pub fn charms_in(&self, state: CharmState) -> Vec<&str> {
        self.progress
            .values()
            .filter(|p| p.state == state)
            .map(|p| p.charm.as_str())
            .collect()
    }

    /// Charms whose relations were still not set when the watcher gave up.
    pub fn pending(&self) -> Vec<&str> {
        self.charms_in(CharmState::Relating)
    }
}

/// Deploys every enabled charm of a registry, then wires their relations.
pub struct Installer<O: Orchestrator> {
    orchestrator: Arc<O>,
    config: Config,
}

impl<O: Orchestrator> Installer<O> {
    pub fn new(orchestrator: Arc<O>, config: Config) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub async fn run(&self, registry: &CharmRegistry) -> Result<InstallReport> {
        registry.validate().context("Charm registry is inconsistent")?;

        let mut progress = ProgressBook::new();
        for charm in registry.disabled() {
            let mut entry = CharmProgress::new(&charm.name);
            CharmStateMachine::transition(&mut entry, LifecycleEvent::Disabled)?;
            log::debug!("{} is disabled, skipping", charm.display_name);
            progress.insert(charm.name.clone(), entry);
        }

        let charms = registry.deploy_order();
        for charm in &charms {
            progress.insert(charm.name.clone(), CharmProgress::new(&charm.name));
        }

        log::info!(
            "Deploying {} charms: {}",
            charms.len(),
            charms
                .iter()
                .map(|c| c.display_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        DeployQueue::new(
            self.orchestrator.clone(),
            self.config.deploy_retry_interval(),
            self.config.max_deploy_passes,
        )
        .run_deploy_loop(&charms, &mut progress)
        .await?;

        log::info!("Processing relations and finalizing services");

        // Exhausted attempts leave charms in Relating; the report carries them.
        let relation_passes = RelationWatcher::new(
            self.orchestrator.clone(),
            self.config.relation_policy,
            self.config.relation_retry_interval(),
            self.config.max_relation_attempts,
        )
        .watch_relations(&charms, &mut progress)
        .await?;

        Ok(InstallReport {
            progress,
            relation_passes,
        })
    }
}
