//! One poll cycle: rows in, snapshot out.
//!
//! `Monitor` ties the pure pieces together. It turns a fetch result into a
//! `PollOutcome`, runs the fire alert machine, drives the notifier and hands
//! the resulting `Snapshot` to every subscriber. The scheduler owns exactly
//! one `Monitor` and is the only caller of `apply`, which keeps the alert
//! memory single-writer.

use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::fire::{AlertAction, AlertDecision, AlertPhase, AlertPolicy, FireAlertMachine};
use crate::alert::stalenesses::mark_stale_at;
use crate::analysis::reduction::{ReducedState, reduce};
use crate::config::Config;
use crate::ingest::StatusSource;
use crate::logging::{self, Component};
use crate::model::{FireWatchError, SensorReading};
use crate::notify::{FireAlert, Notifier};

/// Result of one poll before alerting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PollOutcome {
    Reduced(ReducedState),
    /// The status source could not be reached or answered with garbage.
    /// Distinct from "no devices" and from "all devices offline".
    Unreachable(String),
}

impl PollOutcome {
    pub fn headline(&self) -> String {
        match self {
            PollOutcome::Reduced(reduced) => reduced.headline(),
            PollOutcome::Unreachable(_) => "Connection failed - status unavailable".to_string(),
        }
    }

    pub fn reduced(&self) -> Option<&ReducedState> {
        match self {
            PollOutcome::Reduced(reduced) => Some(reduced),
            PollOutcome::Unreachable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub observed_at: DateTime<Utc>,
    pub outcome: PollOutcome,
    pub decision: AlertDecision,
}

pub struct Monitor {
    machine: FireAlertMachine,
    notifier: Box<dyn Notifier>,
    subscribers: Vec<Sender<Snapshot>>,
    stale_after_minutes: Option<u64>,
    emergency_number: String,
}

impl Monitor {
    pub fn new(policy: AlertPolicy, notifier: Box<dyn Notifier>) -> Self {
        Self {
            machine: FireAlertMachine::new(policy),
            notifier,
            subscribers: Vec::new(),
            stale_after_minutes: None,
            emergency_number: "101".to_string(),
        }
    }

    pub fn from_config(config: &Config, notifier: Box<dyn Notifier>) -> Self {
        Self::new(config.monitoring.alert_policy, notifier)
            .with_staleness(config.monitoring.stale_after_minutes)
            .with_emergency_number(&config.alerts.emergency_number)
    }

    pub fn with_staleness(mut self, stale_after_minutes: Option<u64>) -> Self {
        self.stale_after_minutes = stale_after_minutes;
        self
    }

    pub fn with_emergency_number(mut self, number: &str) -> Self {
        self.emergency_number = number.to_string();
        self
    }

    /// Registers an observer. Every applied snapshot is sent to it; a
    /// dropped receiver is forgotten on the next send.
    pub fn subscribe(&mut self) -> Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn alert_phase(&self) -> AlertPhase {
        self.machine.phase()
    }

    /// Turns a fetch result into an outcome, applying the staleness rule
    /// first when one is configured.
    pub fn evaluate(
        &self,
        result: Result<Vec<SensorReading>, FireWatchError>,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        match result {
            Ok(rows) => {
                let rows = match self.stale_after_minutes {
                    Some(max_age) => mark_stale_at(rows, max_age, now),
                    None => rows,
                };
                let reduced = reduce(&rows);
                logging::debug(
                    Component::Reducer,
                    None,
                    &format!(
                        "{} row(s) reduced to {} location(s): {:?}",
                        rows.len(),
                        reduced.device_count(),
                        reduced.overall_state
                    ),
                );
                PollOutcome::Reduced(reduced)
            }
            Err(err) => {
                logging::log_backend_failure(None, "fetch status", &err);
                PollOutcome::Unreachable(err.to_string())
            }
        }
    }

    /// Runs the alert machine on `outcome`, updates the notifier and
    /// broadcasts the snapshot.
    ///
    /// An unreachable source leaves the alert exactly as it was: losing the
    /// connection is not evidence that a fire went out.
    pub fn apply(&mut self, outcome: PollOutcome, now: DateTime<Utc>) -> Snapshot {
        let decision = match &outcome {
            PollOutcome::Reduced(reduced) => self
                .machine
                .transition(&reduced.fire_locations, reduced.fire_display_names()),
            PollOutcome::Unreachable(_) => AlertDecision::none(),
        };

        self.deliver(&decision);

        let snapshot = Snapshot {
            observed_at: now,
            outcome,
            decision,
        };
        self.broadcast(&snapshot);
        snapshot
    }

    /// Fetches from `source` and applies the result in one go.
    pub fn poll_once(&mut self, source: &dyn StatusSource) -> Snapshot {
        let now = Utc::now();
        let outcome = self.evaluate(source.fetch_status(), now);
        self.apply(outcome, now)
    }

    /// Drops the alert and forgets every fire seen so far.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.notifier.clear();
    }

    fn deliver(&mut self, decision: &AlertDecision) {
        match decision.action {
            AlertAction::Raise | AlertAction::Refresh => {
                if let Some(alert) = FireAlert::from_decision(decision, &self.emergency_number) {
                    if decision.action == AlertAction::Raise {
                        logging::warn(
                            Component::Alert,
                            None,
                            &format!("Fire detected at {} location(s)", decision.count),
                        );
                    }
                    self.notifier.show(&alert);
                }
            }
            AlertAction::Clear => self.notifier.clear(),
            AlertAction::None => {}
        }
    }

    fn broadcast(&mut self, snapshot: &Snapshot) {
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::reduction::OverallState;
    use crate::model::DeviceStatus;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    /// Records every call so tests can assert on delivery.
    #[derive(Clone, Default)]
    struct RecordingNotifier {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&mut self, alert: &FireAlert) {
            self.events.lock().unwrap().push(format!("show:{}", alert.body));
        }

        fn clear(&mut self) {
            self.events.lock().unwrap().push("clear".to_string());
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap()
    }

    fn row(location: &str, status: DeviceStatus, at: &str) -> SensorReading {
        SensorReading {
            device_id: format!("esp-{}", location),
            status,
            updated_at: Some(at.to_string()),
            location: Some(location.to_string()),
            block: None,
            system_active: Some(true),
        }
    }

    fn monitor() -> (Monitor, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let monitor = Monitor::new(AlertPolicy::RefreshOnPersist, Box::new(notifier.clone()));
        (monitor, notifier)
    }

    #[test]
    fn test_fire_raises_then_refreshes_then_clears() {
        let (mut monitor, notifier) = monitor();
        let fire = vec![row("305", DeviceStatus::Fire, "2025-03-01T12:59:00+00:00")];
        let safe = vec![row("305", DeviceStatus::Safe, "2025-03-01T13:00:00+00:00")];

        let first = monitor.evaluate(Ok(fire.clone()), fixed_now());
        let s1 = monitor.apply(first, fixed_now());
        let second = monitor.evaluate(Ok(fire), fixed_now());
        let s2 = monitor.apply(second, fixed_now());
        let third = monitor.evaluate(Ok(safe), fixed_now());
        let s3 = monitor.apply(third, fixed_now());

        assert_eq!(s1.decision.action, AlertAction::Raise);
        assert_eq!(s2.decision.action, AlertAction::Refresh);
        assert_eq!(s3.decision.action, AlertAction::Clear);
        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec!["show:Fire alert at 305", "show:Fire alert at 305", "clear"]
        );
        assert_eq!(monitor.alert_phase(), AlertPhase::Idle);
    }

    #[test]
    fn test_unreachable_keeps_alert_active() {
        let (mut monitor, notifier) = monitor();
        let fire = vec![row("305", DeviceStatus::Fire, "2025-03-01T12:59:00+00:00")];
        let outcome = monitor.evaluate(Ok(fire), fixed_now());
        monitor.apply(outcome, fixed_now());

        let outcome = monitor.evaluate(Err(FireWatchError::HttpError(503)), fixed_now());
        assert!(matches!(outcome, PollOutcome::Unreachable(_)));
        assert_eq!(outcome.headline(), "Connection failed - status unavailable");
        let snapshot = monitor.apply(outcome, fixed_now());

        assert_eq!(snapshot.decision.action, AlertAction::None);
        assert_eq!(monitor.alert_phase(), AlertPhase::Alerting);
        assert_eq!(notifier.events.lock().unwrap().len(), 1, "no clear on connection loss");
    }

    #[test]
    fn test_staleness_rule_applies_before_reduction() {
        let (monitor, _) = monitor();
        let monitor = monitor.with_staleness(Some(10));
        let rows = vec![row("305", DeviceStatus::Safe, "2025-03-01T12:00:00+00:00")];

        let outcome = monitor.evaluate(Ok(rows), fixed_now());
        let reduced = outcome.reduced().expect("reduced");
        assert_eq!(reduced.overall_state, OverallState::AllOffline);
    }

    #[test]
    fn test_subscribers_receive_every_snapshot() {
        let (mut monitor, _) = monitor();
        let rx = monitor.subscribe();
        let dropped = monitor.subscribe();
        drop(dropped);

        let outcome = monitor.evaluate(Ok(vec![]), fixed_now());
        monitor.apply(outcome, fixed_now());

        let snapshot = rx.try_recv().expect("snapshot delivered");
        assert_eq!(
            snapshot.outcome.reduced().map(|r| r.overall_state),
            Some(OverallState::NoDevices)
        );
        assert_eq!(monitor.subscribers.len(), 1, "dropped receiver is forgotten");
    }

    #[test]
    fn test_reset_clears_notifier_and_memory() {
        let (mut monitor, notifier) = monitor();
        let fire = vec![row("305", DeviceStatus::Fire, "2025-03-01T12:59:00+00:00")];
        let outcome = monitor.evaluate(Ok(fire.clone()), fixed_now());
        monitor.apply(outcome, fixed_now());

        monitor.reset();
        assert_eq!(monitor.alert_phase(), AlertPhase::Idle);
        assert_eq!(notifier.events.lock().unwrap().last().map(String::as_str), Some("clear"));

        let outcome = monitor.evaluate(Ok(fire), fixed_now());
        assert_eq!(monitor.apply(outcome, fixed_now()).decision.action, AlertAction::Raise);
    }
}
