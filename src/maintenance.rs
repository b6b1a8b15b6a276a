/// Building-wide maintenance toggle.
///
/// Maintenance is not a single switch on the backend: every device row
/// carries its own `system_active` flag. Entering maintenance sets it to
/// `false` on each device and leaving it sets it back to `true`. Each update
/// is attempted independently; a failure on one device never stops the rest.

use std::collections::HashSet;

use serde::Serialize;

use crate::ingest::DeviceControl;
use crate::logging::{self, Component};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceUpdate {
    pub device_id: String,
    /// `Err` holds the rendered failure.
    pub outcome: Result<(), String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SagaOutcome {
    Success,
    PartialFailure,
    TotalFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub enabled: bool,
    pub results: Vec<DeviceUpdate>,
}

impl MaintenanceReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn failed_devices(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_err())
            .map(|r| r.device_id.as_str())
            .collect()
    }

    pub fn outcome(&self) -> SagaOutcome {
        match (self.succeeded(), self.failed()) {
            (_, 0) => SagaOutcome::Success,
            (0, _) => SagaOutcome::TotalFailure,
            _ => SagaOutcome::PartialFailure,
        }
    }

    /// What to tell the operator once every update has been attempted.
    ///
    /// Only a total failure is an error. A partial failure still counts as
    /// done and carries a warning naming the devices that missed the update.
    pub fn summary(&self) -> Result<String, String> {
        let action = if self.enabled { "enabled" } else { "disabled" };
        match self.outcome() {
            SagaOutcome::Success => Ok(format!(
                "Maintenance {} for {} device(s)",
                action,
                self.results.len()
            )),
            SagaOutcome::PartialFailure => Ok(format!(
                "Maintenance {} for {} of {} device(s); warning: update failed for {}",
                action,
                self.succeeded(),
                self.results.len(),
                self.failed_devices().join(", ")
            )),
            SagaOutcome::TotalFailure => Err(format!(
                "maintenance update failed for: {}",
                self.failed_devices().join(", ")
            )),
        }
    }
}

/// Puts every listed device into (or takes it out of) maintenance.
///
/// Duplicate ids are updated once; order of first appearance is kept.
pub fn set_maintenance<S: AsRef<str>>(
    control: &dyn DeviceControl,
    device_ids: &[S],
    enabled: bool,
) -> MaintenanceReport {
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for id in device_ids.iter().map(AsRef::as_ref) {
        if !seen.insert(id) {
            continue;
        }

        let outcome = control.set_system_active(id, !enabled).map_err(|err| {
            logging::log_backend_failure(Some(id), "maintenance update", &err);
            err.to_string()
        });
        results.push(DeviceUpdate {
            device_id: id.to_string(),
            outcome,
        });
    }

    let report = MaintenanceReport { enabled, results };
    let operation = if enabled { "Maintenance on" } else { "Maintenance off" };
    logging::log_bulk_summary(
        Component::Maintenance,
        operation,
        report.results.len(),
        report.succeeded(),
        report.failed(),
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FireWatchError;
    use std::sync::Mutex;

    /// Fails for the ids it is told to, records every call.
    struct FakeControl {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl FakeControl {
        fn new(failing: Vec<&'static str>) -> Self {
            Self {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl DeviceControl for FakeControl {
        fn set_system_active(&self, device_id: &str, active: bool) -> Result<(), FireWatchError> {
            self.calls.lock().unwrap().push((device_id.to_string(), active));
            if self.failing.contains(&device_id) {
                Err(FireWatchError::HttpError(500))
            } else {
                Ok(())
            }
        }

        fn update_location(&self, _: &str, _: &str, _: &str) -> Result<(), FireWatchError> {
            Ok(())
        }
    }

    #[test]
    fn test_enabling_maintenance_deactivates_every_device() {
        let control = FakeControl::new(vec![]);
        let report = set_maintenance(&control, &["esp-1", "esp-2"], true);

        assert_eq!(report.outcome(), SagaOutcome::Success);
        assert_eq!(
            *control.calls.lock().unwrap(),
            vec![("esp-1".to_string(), false), ("esp-2".to_string(), false)]
        );
    }

    #[test]
    fn test_one_failure_does_not_stop_the_rest() {
        let control = FakeControl::new(vec!["esp-2"]);
        let report = set_maintenance(&control, &["esp-1", "esp-2", "esp-3"], false);

        assert_eq!(report.outcome(), SagaOutcome::PartialFailure);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed_devices(), vec!["esp-2"]);
        assert_eq!(control.calls.lock().unwrap().len(), 3);
        assert!(control.calls.lock().unwrap().iter().all(|(_, active)| *active));
    }

    #[test]
    fn test_every_failure_is_total_failure() {
        let control = FakeControl::new(vec!["esp-1", "esp-2"]);
        let report = set_maintenance(&control, &["esp-1", "esp-2"], true);
        assert_eq!(report.outcome(), SagaOutcome::TotalFailure);
        assert_eq!(
            report.results[0].outcome,
            Err("HTTP error: 500".to_string())
        );
    }

    #[test]
    fn test_partial_failure_is_reported_as_done_with_warning() {
        let control = FakeControl::new(vec!["esp-2"]);
        let report = set_maintenance(&control, &["esp-1", "esp-2", "esp-3"], true);
        assert_eq!(
            report.summary(),
            Ok("Maintenance enabled for 2 of 3 device(s); warning: update failed for esp-2".to_string())
        );
    }

    #[test]
    fn test_only_total_failure_is_an_error() {
        let ok = set_maintenance(&FakeControl::new(vec![]), &["esp-1"], false);
        assert_eq!(ok.summary(), Ok("Maintenance disabled for 1 device(s)".to_string()));

        let failed = set_maintenance(&FakeControl::new(vec!["esp-1", "esp-2"]), &["esp-1", "esp-2"], true);
        assert_eq!(
            failed.summary(),
            Err("maintenance update failed for: esp-1, esp-2".to_string())
        );
    }

    #[test]
    fn test_duplicate_ids_are_updated_once() {
        let control = FakeControl::new(vec![]);
        let ids = vec!["esp-1".to_string(), "esp-1".to_string(), "esp-2".to_string()];
        let report = set_maintenance(&control, &ids, true);
        assert_eq!(report.results.len(), 2);
        assert_eq!(control.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_device_list_is_success() {
        let control = FakeControl::new(vec![]);
        let report = set_maintenance::<&str>(&control, &[], true);
        assert_eq!(report.outcome(), SagaOutcome::Success);
        assert!(report.results.is_empty());
    }
}
