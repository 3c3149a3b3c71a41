use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::ProgressBook;
use crate::lifecycle::{CharmStateMachine, LifecycleEvent};
use crate::orchestrator::Orchestrator;
use crate::types::{CharmDescriptor, CharmState, DeployOutcome};

/// Issues deploys in priority order.
///
/// A pass walks the undeployed charms in order. Services the orchestrator
/// already runs are skipped. A deferred deploy ends the pass so that later,
/// lower-priority charms never jump ahead of it.
pub struct DeployQueue<O: Orchestrator> {
    orchestrator: Arc<O>,
    retry_interval: Duration,
    max_passes: u32,
}

impl<O: Orchestrator> DeployQueue<O> {
    pub fn new(orchestrator: Arc<O>, retry_interval: Duration, max_passes: u32) -> Self {
        Self {
            orchestrator,
            retry_interval,
            max_passes,
        }
    }

    pub async fn run_deploy_loop(
        &self,
        charms: &[&CharmDescriptor],
        progress: &mut ProgressBook,
    ) -> Result<()> {
        let mut pass = 0;

        loop {
            pass += 1;

            let pending = self.run_single_pass(charms, progress).await?;
            if pending.is_empty() {
                break;
            }

            if pass >= self.max_passes {
                bail!(
                    "Deploy still pending after {} passes: {}",
                    pass,
                    pending.join(", ")
                );
            }

            log::debug!("{} charms pending deploy: {}", pending.len(), pending.join(", "));
            tokio::time::sleep(self.retry_interval).await;
        }

        Ok(())
    }

    /// Runs one deploy pass and returns the charms still not deployed.
    pub async fn run_single_pass(
        &self,
        charms: &[&CharmDescriptor],
        progress: &mut ProgressBook,
    ) -> Result<Vec<String>> {
        let services = self.deployed_services().await?;
        Self::promote_placed(charms, progress, &services)?;

        for charm in charms {
            let entry = progress
                .get_mut(&charm.name)
                .with_context(|| format!("No progress entry for {}", charm.name))?;

            if !matches!(entry.state, CharmState::Pending | CharmState::Deferred) {
                continue;
            }

            if services.contains(&charm.name) {
                log::info!("{} is already deployed, skipping", charm.display_name);
                CharmStateMachine::transition(entry, LifecycleEvent::AlreadyDeployed)?;
                continue;
            }

            let outcome = self
                .orchestrator
                .deploy(charm)
                .await
                .with_context(|| format!("Deploy of {} failed", charm.name))?;

            match outcome {
                DeployOutcome::Issued => {
                    log::info!("Issued deploy for {}", charm.display_name);
                    CharmStateMachine::transition(entry, LifecycleEvent::DeployIssued)?;
                }
                DeployOutcome::Deferred(reason) => {
                    log::debug!(
                        "{} is waiting for another service ({}), will retry",
                        charm.display_name,
                        reason
                    );
                    CharmStateMachine::transition(entry, LifecycleEvent::DeployDeferred)?;
                    break;
                }
            }
        }

        let services = self.deployed_services().await?;
        Self::promote_placed(charms, progress, &services)?;

        Ok(charms
            .iter()
            .filter(|c| {
                progress
                    .get(&c.name)
                    .map(|p| !Self::is_deployed(p.state))
                    .unwrap_or(true)
            })
            .map(|c| c.name.clone())
            .collect())
    }

    fn is_deployed(state: CharmState) -> bool {
        matches!(
            state,
            CharmState::Deployed | CharmState::Relating | CharmState::Ready
        )
    }

    async fn deployed_services(&self) -> Result<Vec<String>> {
        self.orchestrator
            .deployed_services()
            .await
            .context("Failed to list deployed services")
    }

    fn promote_placed(
        charms: &[&CharmDescriptor],
        progress: &mut ProgressBook,
        services: &[String],
    ) -> Result<()> {
        for charm in charms {
            if let Some(entry) = progress.get_mut(&charm.name) {
                if entry.state == CharmState::Deploying && services.contains(&charm.name) {
                    CharmStateMachine::transition(entry, LifecycleEvent::UnitsPlaced)?;
                }
            }
        }
        Ok(())
    }
}
