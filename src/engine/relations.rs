use chrono::Utc;

use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::types::{
    CharmDescriptor, RelationEdge, RelationOutcome, RelationPass, RelationPolicy, RelationStatus,
};

impl CharmDescriptor {
    /// Runs one relation pass for this charm.
    ///
    /// Waits on this charm's agent and every peer's agent first; if any is not
    /// running the pass ends with no relation calls. Otherwise every edge in
    /// the relation table is handed to the orchestrator. Under
    /// `AbortOnFailure` the first rejected edge ends the pass and the
    /// remaining peers are recorded as skipped.
    ///
    /// Never fails: readiness and relation errors are logged and folded into
    /// the returned pass, whose `needs_retry()` tells the caller to call again.
    pub async fn set_relations(
        &self,
        orchestrator: &dyn Orchestrator,
        policy: RelationPolicy,
    ) -> RelationPass {
        let agents = self.agents_to_wait_for();
        match orchestrator.wait_for_agents(&agents).await {
            Ok(true) => {}
            Ok(false) => {
                log::debug!(
                    "{}: waiting for agents {} before relating",
                    self.name,
                    agents.join(", ")
                );
                return RelationPass::not_ready(&self.name);
            }
            Err(e) => {
                log::warn!("{}: agent readiness check failed: {}", self.name, e);
                return RelationPass::not_ready(&self.name);
            }
        }

        let mut outcomes = Vec::with_capacity(self.relations.len());
        let mut aborted = false;

        for (peer, edge) in &self.relations {
            if aborted {
                outcomes.push(RelationOutcome {
                    peer: peer.clone(),
                    edge: edge.clone(),
                    status: RelationStatus::Skipped,
                    timestamp: Utc::now(),
                });
                continue;
            }

            let status = match orchestrator.add_relation(edge).await {
                Ok(response) => {
                    log::debug!("add_relation {} returned {}", peer, response);
                    RelationStatus::Added { response }
                }
                Err(e) => {
                    log::error!("{}", self.relation_failure(peer, edge, &e));
                    if policy == RelationPolicy::AbortOnFailure {
                        aborted = true;
                    }
                    RelationStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            outcomes.push(RelationOutcome {
                peer: peer.clone(),
                edge: edge.clone(),
                status,
                timestamp: Utc::now(),
            });
        }

        RelationPass {
            charm: self.name.clone(),
            agents_ready: true,
            outcomes,
        }
    }

    fn relation_failure(
        &self,
        peer: &str,
        edge: &RelationEdge,
        err: &OrchestratorError,
    ) -> String {
        format!("{}: relation with {} failed ({}): {}", self.name, peer, edge, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charms::cinder_descriptor;
    use crate::orchestrator::InMemoryOrchestrator;

    fn cinder_cloud() -> InMemoryOrchestrator {
        InMemoryOrchestrator::new()
            .with_service("cinder")
            .with_service("glance")
            .with_service("keystone")
            .with_service("rabbitmq-server")
            .with_service("nova-cloud-controller")
    }

    #[tokio::test]
    async fn test_waits_for_own_agent_then_peers() {
        let orchestrator = cinder_cloud();
        let cinder = cinder_descriptor().unwrap();

        cinder
            .set_relations(&orchestrator, RelationPolicy::default())
            .await;

        let calls = orchestrator.wait_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "cinder");
        assert_eq!(calls[0].len(), 5);
    }

    #[tokio::test]
    async fn test_all_relations_added() {
        let orchestrator = cinder_cloud();
        let cinder = cinder_descriptor().unwrap();

        let pass = cinder
            .set_relations(&orchestrator, RelationPolicy::AbortOnFailure)
            .await;

        assert!(pass.is_complete());
        assert_eq!(pass.attempted(), 4);
        assert_eq!(orchestrator.relations().len(), 4);
    }

    #[tokio::test]
    async fn test_not_ready_agents_make_no_calls() {
        let orchestrator = InMemoryOrchestrator::new().with_service("cinder");
        let cinder = cinder_descriptor().unwrap();

        let pass = cinder
            .set_relations(&orchestrator, RelationPolicy::default())
            .await;

        assert!(pass.needs_retry());
        assert!(!pass.agents_ready);
        assert!(orchestrator.relation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_abort_policy_skips_remaining_peers() {
        let orchestrator = cinder_cloud();
        // glance sorts first in the relation table
        orchestrator.set_not_ready("glance");
        let cinder = cinder_descriptor().unwrap();

        let pass = cinder
            .set_relations(&orchestrator, RelationPolicy::AbortOnFailure)
            .await;

        assert!(pass.needs_retry());
        assert_eq!(pass.attempted(), 1);
        assert_eq!(pass.failed_peers(), vec!["glance"]);
        assert_eq!(orchestrator.relation_calls().len(), 1);
        assert_eq!(pass.outcomes.len(), 4);
    }

    #[tokio::test]
    async fn test_continue_policy_attempts_every_peer() {
        let orchestrator = cinder_cloud();
        orchestrator.set_not_ready("glance");
        let cinder = cinder_descriptor().unwrap();

        let pass = cinder
            .set_relations(&orchestrator, RelationPolicy::ContinueOnFailure)
            .await;

        assert!(pass.needs_retry());
        assert_eq!(pass.attempted(), 4);
        assert_eq!(pass.failed_peers(), vec!["glance"]);
        assert_eq!(orchestrator.relations().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_message_names_peer_once() {
        let orchestrator = cinder_cloud();
        orchestrator.set_not_ready("glance");
        let cinder = cinder_descriptor().unwrap();

        let pass = cinder
            .set_relations(&orchestrator, RelationPolicy::AbortOnFailure)
            .await;
        let outcome = &pass.outcomes[0];
        let err = match &outcome.status {
            RelationStatus::Failed { error } => error.clone(),
            other => panic!("expected a failed relation, got {:?}", other),
        };
        assert_eq!(err, "glance not ready for relation");

        let message = cinder.relation_failure(
            &outcome.peer,
            &outcome.edge,
            &OrchestratorError::PeerNotReady {
                peer: "glance".to_string(),
            },
        );
        assert_eq!(
            message,
            "cinder: relation with glance failed \
             (cinder:image-service <-> glance:image-service): glance not ready for relation"
        );
        assert_eq!(message.matches("not ready").count(), 1);
    }

    #[tokio::test]
    async fn test_charm_without_relations_completes() {
        let orchestrator = InMemoryOrchestrator::new().with_service("ntp");
        let ntp = CharmDescriptor::new("ntp", "NTP", 1, 99);

        let pass = ntp.set_relations(&orchestrator, RelationPolicy::default()).await;
        assert!(pass.is_complete());
        assert!(pass.outcomes.is_empty());
    }
}
