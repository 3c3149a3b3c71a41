use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::ProgressBook;
use crate::lifecycle::{CharmStateMachine, LifecycleEvent};
use crate::orchestrator::Orchestrator;
use crate::types::{CharmDescriptor, CharmState, RelationPass, RelationPolicy};

/// Keeps calling `set_relations` on deployed charms until each reports done.
pub struct RelationWatcher<O: Orchestrator> {
    orchestrator: Arc<O>,
    policy: RelationPolicy,
    retry_interval: Duration,
    max_attempts: u32,
}

impl<O: Orchestrator> RelationWatcher<O> {
    pub fn new(
        orchestrator: Arc<O>,
        policy: RelationPolicy,
        retry_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            orchestrator,
            policy,
            retry_interval,
            max_attempts,
        }
    }

    /// Returns the last pass of every charm that needed one. Running out of
    /// attempts is not an error: the charms still pending stay in `Relating`.
    pub async fn watch_relations(
        &self,
        charms: &[&CharmDescriptor],
        progress: &mut ProgressBook,
    ) -> Result<Vec<RelationPass>> {
        let mut attempt = 0;
        let mut last_passes: Vec<RelationPass> = Vec::new();

        loop {
            attempt += 1;

            let passes = self.run_single_tick(charms, progress).await?;
            for pass in passes {
                match last_passes.iter_mut().find(|p| p.charm == pass.charm) {
                    Some(existing) => *existing = pass,
                    None => last_passes.push(pass),
                }
            }

            let pending = Self::pending(charms, progress);
            if pending.is_empty() {
                log::info!("All relations set after {} attempts", attempt);
                break;
            }

            if self.max_attempts > 0 && attempt >= self.max_attempts {
                log::warn!(
                    "Relationships still pending after {} attempts: {}",
                    attempt,
                    pending.join(", ")
                );
                break;
            }

            tokio::time::sleep(self.retry_interval).await;
        }

        Ok(last_passes)
    }

    /// One relation pass over every deployed charm whose relations are not
    /// yet set.
    pub async fn run_single_tick(
        &self,
        charms: &[&CharmDescriptor],
        progress: &mut ProgressBook,
    ) -> Result<Vec<RelationPass>> {
        let mut passes = Vec::new();

        for charm in charms {
            let entry = progress
                .get_mut(&charm.name)
                .with_context(|| format!("No progress entry for {}", charm.name))?;

            if !matches!(entry.state, CharmState::Deployed | CharmState::Relating) {
                continue;
            }

            CharmStateMachine::transition(entry, LifecycleEvent::RelationPassStarted)?;
            let pass = charm
                .set_relations(&*self.orchestrator, self.policy)
                .await;

            if pass.is_complete() {
                log::info!("Relations set for {}", charm.display_name);
                CharmStateMachine::transition(entry, LifecycleEvent::RelationsComplete)?;
            } else {
                CharmStateMachine::transition(entry, LifecycleEvent::RelationPassIncomplete)?;
            }
            passes.push(pass);
        }

        Ok(passes)
    }

    fn pending(charms: &[&CharmDescriptor], progress: &ProgressBook) -> Vec<String> {
        charms
            .iter()
            .filter(|c| {
                progress
                    .get(&c.name)
                    .map(|p| p.state != CharmState::Ready)
                    .unwrap_or(true)
            })
            .map(|c| c.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charms::cinder_descriptor;
    use crate::lifecycle::CharmProgress;
    use crate::orchestrator::InMemoryOrchestrator;

    fn deployed(charm: &CharmDescriptor) -> ProgressBook {
        let mut entry = CharmProgress::new(&charm.name);
        CharmStateMachine::transition(&mut entry, LifecycleEvent::AlreadyDeployed).unwrap();
        [(charm.name.clone(), entry)].into_iter().collect()
    }

    fn cinder_cloud() -> Arc<InMemoryOrchestrator> {
        Arc::new(
            InMemoryOrchestrator::new()
                .with_service("cinder")
                .with_service("glance")
                .with_service("keystone")
                .with_service("rabbitmq-server")
                .with_service("nova-cloud-controller"),
        )
    }

    #[tokio::test]
    async fn test_tick_skips_charms_not_deployed() {
        let cinder = cinder_descriptor().unwrap();
        let mut progress: ProgressBook = [(cinder.name.clone(), CharmProgress::new("cinder"))]
            .into_iter()
            .collect();

        let orchestrator = cinder_cloud();
        let watcher = RelationWatcher::new(
            orchestrator.clone(),
            RelationPolicy::default(),
            Duration::from_millis(1),
            1,
        );

        let passes = watcher.run_single_tick(&[&cinder], &mut progress).await.unwrap();
        assert!(passes.is_empty());
        assert!(orchestrator.wait_calls().is_empty());
    }

    #[tokio::test]
    async fn test_watch_completes_in_one_attempt() {
        let cinder = cinder_descriptor().unwrap();
        let mut progress = deployed(&cinder);

        let orchestrator = cinder_cloud();
        let watcher = RelationWatcher::new(
            orchestrator.clone(),
            RelationPolicy::default(),
            Duration::from_millis(1),
            0,
        );

        let passes = watcher.watch_relations(&[&cinder], &mut progress).await.unwrap();

        assert_eq!(passes.len(), 1);
        assert!(passes[0].is_complete());
        assert_eq!(progress["cinder"].state, CharmState::Ready);
        assert_eq!(progress["cinder"].relation_passes, 1);
    }

    #[tokio::test]
    async fn test_watch_gives_up_after_max_attempts() {
        let cinder = cinder_descriptor().unwrap();
        let mut progress = deployed(&cinder);

        let orchestrator = cinder_cloud();
        orchestrator.set_not_ready("keystone");
        let watcher = RelationWatcher::new(
            orchestrator.clone(),
            RelationPolicy::AbortOnFailure,
            Duration::from_millis(1),
            3,
        );

        let passes = watcher.watch_relations(&[&cinder], &mut progress).await.unwrap();

        assert_eq!(passes.len(), 1);
        assert!(passes[0].needs_retry());
        assert_eq!(passes[0].failed_peers(), vec!["keystone"]);
        assert_eq!(progress["cinder"].state, CharmState::Relating);
        assert_eq!(progress["cinder"].relation_passes, 3);
        // glance succeeds, keystone fails, the rest are skipped: two calls per pass
        assert_eq!(orchestrator.relation_calls().len(), 6);
    }
}
