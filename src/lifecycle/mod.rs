pub mod state_machine;

pub use state_machine::{CharmStateMachine, LifecycleEvent};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::CharmState;

const MAX_HISTORY: usize = 50;

/// Where one charm is in the install, with a bounded transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharmProgress {
    pub charm: String,
    pub state: CharmState,
    pub relation_passes: u32,
    pub history: VecDeque<TransitionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub event: LifecycleEvent,
    pub state: CharmState,
}

impl CharmProgress {
    pub fn new(charm: impl Into<String>) -> Self {
        Self {
            charm: charm.into(),
            state: CharmState::Pending,
            relation_passes: 0,
            history: VecDeque::new(),
        }
    }

    fn record(&mut self, state: CharmState, event: LifecycleEvent) {
        if event == LifecycleEvent::RelationPassStarted {
            self.relation_passes += 1;
        }
        self.state = state;
        self.history.push_back(TransitionRecord {
            timestamp: Utc::now(),
            event,
            state,
        });

        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }
}
