//! Persistent fire alert rendering and delivery.
//!
//! A `FireAlert` is what a user sees while the alert machine is `Alerting`.
//! It is persistent: there is no dismiss call on `Notifier`, and only the
//! monitor clears it, on a `Clear` decision or when monitoring stops.

use serde::Serialize;

use crate::alert::fire::{AlertAction, AlertDecision};
use crate::logging::{self, Component};

pub const ALERT_TITLE: &str = "🔥 FIRE DETECTED!";

/// Action attached to every alert so the reader can escalate immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Escalation {
    EmergencyDial { number: String },
}

impl Escalation {
    pub fn label(&self) -> String {
        match self {
            Escalation::EmergencyDial { number } => format!("Call {}", number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FireAlert {
    pub title: String,
    pub body: String,
    pub locations: Vec<String>,
    pub count: usize,
    pub escalation: Escalation,
    pub persistent: bool,
}

impl FireAlert {
    /// Renders the alert for a `Raise` or `Refresh` decision. Returns `None`
    /// for decisions that do not show anything.
    pub fn from_decision(decision: &AlertDecision, emergency_number: &str) -> Option<Self> {
        if !matches!(decision.action, AlertAction::Raise | AlertAction::Refresh) {
            return None;
        }

        let body = match decision.locations.as_slice() {
            [only] if decision.count == 1 => format!("Fire alert at {}", only),
            _ => format!("Fire detected at {} location(s)", decision.count),
        };

        Some(FireAlert {
            title: ALERT_TITLE.to_string(),
            body,
            locations: decision.locations.clone(),
            count: decision.count,
            escalation: Escalation::EmergencyDial {
                number: emergency_number.to_string(),
            },
            persistent: true,
        })
    }
}

/// Delivery channel for the persistent alert.
pub trait Notifier: Send {
    /// Shows the alert, replacing any alert already shown.
    fn show(&mut self, alert: &FireAlert);

    /// Removes the alert.
    fn clear(&mut self);
}

/// Writes alerts to the structured log.
#[derive(Debug, Default)]
pub struct LogNotifier {
    showing: bool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }
}

impl Notifier for LogNotifier {
    fn show(&mut self, alert: &FireAlert) {
        self.showing = true;
        logging::error(
            Component::Alert,
            None,
            &format!(
                "{} {} [{}] ({})",
                alert.title,
                alert.body,
                alert.locations.join(", "),
                alert.escalation.label()
            ),
        );
    }

    fn clear(&mut self) {
        if self.showing {
            logging::info(Component::Alert, None, "Fire alert cleared - all locations safe");
        }
        self.showing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(action: AlertAction, locations: &[&str]) -> AlertDecision {
        AlertDecision {
            action,
            locations: locations.iter().map(|s| s.to_string()).collect(),
            count: locations.len(),
        }
    }

    #[test]
    fn test_single_location_names_it() {
        let alert = FireAlert::from_decision(&decision(AlertAction::Raise, &["305 - B"]), "101")
            .expect("raise renders");
        assert_eq!(alert.body, "Fire alert at 305 - B");
        assert_eq!(alert.title, ALERT_TITLE);
        assert!(alert.persistent);
        assert_eq!(alert.escalation.label(), "Call 101");
    }

    #[test]
    fn test_multiple_locations_are_counted() {
        let alert = FireAlert::from_decision(&decision(AlertAction::Refresh, &["101", "102"]), "112")
            .expect("refresh renders");
        assert_eq!(alert.body, "Fire detected at 2 location(s)");
        assert_eq!(
            alert.escalation,
            Escalation::EmergencyDial {
                number: "112".to_string()
            }
        );
    }

    #[test]
    fn test_clear_and_none_do_not_render() {
        assert!(FireAlert::from_decision(&decision(AlertAction::Clear, &[]), "101").is_none());
        assert!(FireAlert::from_decision(&AlertDecision::none(), "101").is_none());
    }

    #[test]
    fn test_log_notifier_tracks_visibility() {
        let mut notifier = LogNotifier::new();
        let alert = FireAlert::from_decision(&decision(AlertAction::Raise, &["101"]), "101")
            .expect("raise renders");
        notifier.show(&alert);
        assert!(notifier.is_showing());
        notifier.clear();
        assert!(!notifier.is_showing());
    }
}
