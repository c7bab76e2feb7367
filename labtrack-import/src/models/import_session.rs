//! Import state machine
//!
//! An import progresses through: VALIDATING → RECONCILING → DECIDING →
//! COMMITTED | ROLLEDBACK

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportState {
    /// Schema gate, sheet and catalog loading
    Validating,
    /// Rows being reconciled, one at a time
    Reconciling,
    /// All rows seen; choosing commit or rollback
    Deciding,
    /// Changes are persistent
    Committed,
    /// Nothing was persisted (failures or dry run)
    RolledBack,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: ImportState,
    pub new_state: ImportState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state of one import invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub state: ImportState,

    /// Roll back even when every row succeeded
    pub dry_run: bool,

    pub started_at: DateTime<Utc>,

    /// Set once a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl ImportSession {
    pub fn new(dry_run: bool) -> Self {
        Self {
            state: ImportState::Validating,
            dry_run,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ImportState) -> StateTransition {
        let transition = StateTransition {
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ImportState::Committed | ImportState::RolledBack)
    }

    /// Wall time from start to the terminal state (or now)
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}
