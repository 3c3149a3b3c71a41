use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::CharmProgress;
use crate::types::CharmState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Disabled,
    AlreadyDeployed,
    DeployIssued,
    DeployDeferred,
    UnitsPlaced,
    RelationPassStarted,
    RelationPassIncomplete,
    RelationsComplete,
}

pub struct CharmStateMachine;

impl CharmStateMachine {
    pub fn transition(charm: &mut CharmProgress, event: LifecycleEvent) -> Result<CharmState> {
        let new_state = match (charm.state, &event) {
            (CharmState::Pending, LifecycleEvent::Disabled) => CharmState::Skipped,

            (CharmState::Pending | CharmState::Deferred, LifecycleEvent::AlreadyDeployed) => {
                CharmState::Deployed
            }
            (CharmState::Pending | CharmState::Deferred, LifecycleEvent::DeployIssued) => {
                CharmState::Deploying
            }
            (CharmState::Pending | CharmState::Deferred, LifecycleEvent::DeployDeferred) => {
                CharmState::Deferred
            }
            (CharmState::Deploying, LifecycleEvent::UnitsPlaced) => CharmState::Deployed,

            (CharmState::Deployed | CharmState::Relating, LifecycleEvent::RelationPassStarted) => {
                CharmState::Relating
            }
            (CharmState::Relating, LifecycleEvent::RelationPassIncomplete) => CharmState::Relating,
            (CharmState::Relating, LifecycleEvent::RelationsComplete) => CharmState::Ready,

            _ => {
                return Err(anyhow!(
                    "Invalid transition for {} from {:?} with event {:?}",
                    charm.charm,
                    charm.state,
                    event
                ));
            }
        };

        charm.record(new_state, event);
        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_then_relate() {
        let mut charm = CharmProgress::new("cinder");

        CharmStateMachine::transition(&mut charm, LifecycleEvent::DeployIssued).unwrap();
        assert_eq!(charm.state, CharmState::Deploying);

        CharmStateMachine::transition(&mut charm, LifecycleEvent::UnitsPlaced).unwrap();
        CharmStateMachine::transition(&mut charm, LifecycleEvent::RelationPassStarted).unwrap();
        CharmStateMachine::transition(&mut charm, LifecycleEvent::RelationPassIncomplete).unwrap();
        CharmStateMachine::transition(&mut charm, LifecycleEvent::RelationPassStarted).unwrap();
        CharmStateMachine::transition(&mut charm, LifecycleEvent::RelationsComplete).unwrap();

        assert_eq!(charm.state, CharmState::Ready);
        assert_eq!(charm.relation_passes, 2);
        assert_eq!(charm.history.len(), 6);
    }

    #[test]
    fn test_deferred_deploy_can_be_retried() {
        let mut charm = CharmProgress::new("cinder");

        CharmStateMachine::transition(&mut charm, LifecycleEvent::DeployDeferred).unwrap();
        assert_eq!(charm.state, CharmState::Deferred);
        CharmStateMachine::transition(&mut charm, LifecycleEvent::DeployDeferred).unwrap();
        CharmStateMachine::transition(&mut charm, LifecycleEvent::DeployIssued).unwrap();
        assert_eq!(charm.state, CharmState::Deploying);
    }

    #[test]
    fn test_disabled_is_terminal() {
        let mut charm = CharmProgress::new("swift");

        CharmStateMachine::transition(&mut charm, LifecycleEvent::Disabled).unwrap();
        assert!(charm.state.is_terminal());

        let result = CharmStateMachine::transition(&mut charm, LifecycleEvent::DeployIssued);
        assert!(result.is_err());
        assert_eq!(charm.state, CharmState::Skipped);
    }

    #[test]
    fn test_cannot_relate_before_deploy() {
        let mut charm = CharmProgress::new("cinder");

        let result = CharmStateMachine::transition(&mut charm, LifecycleEvent::RelationPassStarted);
        assert!(result.is_err());
        assert!(charm.history.is_empty());
    }
}
