//! Fire alert state machine.
//!
//! Decides, once per poll, whether the persistent fire alert must be
//! raised, refreshed, cleared, or left alone.
//!
//! ```text
//!            F non-empty (Raise)
//!   Idle ───────────────────────────► Alerting ──┐
//!    ▲                                   │       │ F non-empty (Refresh)
//!    │          F empty (Clear)          │ ◄─────┘
//!    └───────────────────────────────────┘
//! ```
//!
//! The machine owns the only mutable alert memory in the service: the
//! fire set seen on the previous poll. Nothing else reads or writes it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What to do while a fire persists across polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Re-issue the alert on every poll while any fire is present.
    #[default]
    RefreshOnPersist,
    /// Re-issue only when the set of burning locations changes.
    EdgeTriggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertPhase {
    Idle,
    Alerting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertAction {
    Raise,
    Refresh,
    Clear,
    None,
}

/// The per-poll decision handed to the notification side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertDecision {
    pub action: AlertAction,
    /// Human-readable fire locations, in backend order.
    pub locations: Vec<String>,
    pub count: usize,
}

impl AlertDecision {
    pub fn none() -> Self {
        AlertDecision {
            action: AlertAction::None,
            locations: Vec::new(),
            count: 0,
        }
    }

    /// Observers are told about every decision that touched the alert.
    pub fn changes_state(&self) -> bool {
        self.action != AlertAction::None
    }
}

/// Memory carried between polls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    pub last_known_fire_set: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct FireAlertMachine {
    state: AlertState,
    policy: AlertPolicy,
}

impl FireAlertMachine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            state: AlertState::default(),
            policy,
        }
    }

    pub fn phase(&self) -> AlertPhase {
        if self.state.last_known_fire_set.is_empty() {
            AlertPhase::Idle
        } else {
            AlertPhase::Alerting
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Advances the machine with the current fire set `fire` and the display
    /// names of those locations.
    pub fn transition(&mut self, fire: &BTreeSet<String>, locations: Vec<String>) -> AlertDecision {
        let previous = &self.state.last_known_fire_set;

        let action = match (fire.is_empty(), previous.is_empty()) {
            (true, true) => AlertAction::None,
            (true, false) => AlertAction::Clear,
            (false, true) => AlertAction::Raise,
            (false, false) => match self.policy {
                AlertPolicy::RefreshOnPersist => AlertAction::Refresh,
                AlertPolicy::EdgeTriggered if fire != previous => AlertAction::Refresh,
                AlertPolicy::EdgeTriggered => AlertAction::None,
            },
        };

        self.state.last_known_fire_set = fire.clone();

        match action {
            AlertAction::Raise | AlertAction::Refresh => AlertDecision {
                action,
                count: fire.len(),
                locations,
            },
            _ => AlertDecision {
                action,
                locations: Vec::new(),
                count: 0,
            },
        }
    }

    /// Forgets every fire seen so far. Used when monitoring stops so that a
    /// later start raises again instead of refreshing a stale memory.
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
