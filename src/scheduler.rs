//! Poll supervisor.
//!
//! A supervisor thread ticks at a fixed interval. Each tick hands the fetch
//! to its own short-lived thread and goes straight back to waiting, so a slow
//! backend never delays the timer. Fetches can therefore overlap; every
//! fetch carries a sequence number and the supervisor applies a completion
//! only if it is newer than the last one applied. Completions are applied on
//! the supervisor thread alone, which is the single writer of the monitor's
//! alert memory.
//!
//! Stopping drops the event channel, so fetches still in flight have
//! nowhere to report and their results are ignored. The monitor is reset
//! and handed back to the caller.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::ingest::StatusSource;
use crate::logging::{self, Component};
use crate::model::{FireWatchError, SensorReading};
use crate::monitor::Monitor;

pub type SharedSource = Arc<dyn StatusSource + Send + Sync>;

enum PollEvent {
    Stop,
    Completed {
        sequence: u64,
        result: Result<Vec<SensorReading>, FireWatchError>,
    },
}

/// Latest-wins guard over fetch sequence numbers. Sequence numbers start at 1.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    last_applied: u64,
}

impl SequenceGuard {
    /// Returns `true` and records `sequence` if it is newer than anything
    /// admitted so far.
    pub fn admit(&mut self, sequence: u64) -> bool {
        if sequence > self.last_applied {
            self.last_applied = sequence;
            true
        } else {
            false
        }
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }
}

struct RunningPoll {
    control: Sender<PollEvent>,
    handle: JoinHandle<Monitor>,
}

pub struct PollSupervisor {
    interval: Duration,
    running: Option<RunningPoll>,
}

impl PollSupervisor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts polling `source` and feeding `monitor`.
    ///
    /// Returns `AlreadyRunning` (and drops `monitor`) if a poll loop is
    /// already active; the running loop is left untouched.
    pub fn start(&mut self, source: SharedSource, monitor: Monitor) -> Result<(), FireWatchError> {
        if self.running.is_some() {
            logging::warn(Component::Scheduler, None, "start ignored - monitoring already running");
            return Err(FireWatchError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel();
        let loop_tx = tx.clone();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("firewatch-poll".to_string())
            .spawn(move || run_loop(source, monitor, interval, loop_tx, rx))
            .map_err(|e| FireWatchError::Transport(format!("failed to spawn poll thread: {}", e)))?;

        logging::info(
            Component::Scheduler,
            None,
            &format!("Monitoring started, polling every {:?}", interval),
        );
        self.running = Some(RunningPoll { control: tx, handle });
        Ok(())
    }

    /// Stops polling and returns the reset monitor. Returns `None` when
    /// nothing was running or the poll thread died.
    pub fn stop(&mut self) -> Option<Monitor> {
        let running = self.running.take()?;
        // The loop may already be gone; joining below reports that.
        let _ = running.control.send(PollEvent::Stop);

        match running.handle.join() {
            Ok(monitor) => {
                logging::info(Component::Scheduler, None, "Monitoring stopped");
                Some(monitor)
            }
            Err(_) => {
                logging::error(Component::Scheduler, None, "poll thread panicked");
                None
            }
        }
    }
}

impl Drop for PollSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    source: SharedSource,
    mut monitor: Monitor,
    interval: Duration,
    tx: Sender<PollEvent>,
    rx: mpsc::Receiver<PollEvent>,
) -> Monitor {
    let mut guard = SequenceGuard::default();
    let mut next_sequence: u64 = 0;
    let mut next_tick = Instant::now();

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(PollEvent::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(PollEvent::Completed { sequence, result }) => {
                if !guard.admit(sequence) {
                    logging::debug(
                        Component::Scheduler,
                        None,
                        &format!(
                            "discarding fetch #{} (already applied #{})",
                            sequence,
                            guard.last_applied()
                        ),
                    );
                    continue;
                }
                let now = Utc::now();
                let outcome = monitor.evaluate(result, now);
                monitor.apply(outcome, now);
            }
            Err(RecvTimeoutError::Timeout) => {
                next_sequence += 1;
                spawn_fetch(Arc::clone(&source), next_sequence, tx.clone());

                next_tick += interval;
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now + interval;
                }
            }
        }
    }

    monitor.reset();
    monitor
}

fn spawn_fetch(source: SharedSource, sequence: u64, tx: Sender<PollEvent>) {
    let spawned = thread::Builder::new()
        .name(format!("firewatch-fetch-{}", sequence))
        .spawn(move || {
            let result = source.fetch_status();
            // Receiver is gone once monitoring stops.
            let _ = tx.send(PollEvent::Completed { sequence, result });
        });

    if let Err(e) = spawned {
        logging::error(
            Component::Scheduler,
            None,
            &format!("could not spawn fetch #{}: {}", sequence, e),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::fire::{AlertAction, AlertPhase, AlertPolicy};
    use crate::model::DeviceStatus;
    use crate::notify::LogNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        status: DeviceStatus,
    }

    impl StatusSource for CountingSource {
        fn fetch_status(&self) -> Result<Vec<SensorReading>, FireWatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SensorReading {
                device_id: "esp-1".to_string(),
                status: self.status,
                updated_at: Some("2025-03-01T10:00:00+00:00".to_string()),
                location: Some("305".to_string()),
                block: None,
                system_active: Some(true),
            }])
        }
    }

    /// The first fetch is slow and reports fire; later fetches are fast and
    /// report safe.
    struct SlowFirstSource {
        calls: AtomicUsize,
    }

    impl StatusSource for SlowFirstSource {
        fn fetch_status(&self) -> Result<Vec<SensorReading>, FireWatchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = if call == 0 {
                thread::sleep(Duration::from_millis(400));
                DeviceStatus::Fire
            } else {
                DeviceStatus::Safe
            };
            Ok(vec![SensorReading {
                device_id: "esp-1".to_string(),
                status,
                updated_at: Some("2025-03-01T10:00:00+00:00".to_string()),
                location: Some("305".to_string()),
                block: None,
                system_active: Some(true),
            }])
        }
    }

    fn monitor() -> Monitor {
        Monitor::new(AlertPolicy::RefreshOnPersist, Box::new(LogNotifier::new()))
    }

    #[test]
    fn test_sequence_guard_discards_older_completions() {
        let mut guard = SequenceGuard::default();
        assert!(guard.admit(2));
        assert!(!guard.admit(1), "older completion must be discarded");
        assert!(!guard.admit(2), "duplicate completion must be discarded");
        assert!(guard.admit(3));
        assert_eq!(guard.last_applied(), 3);
    }

    #[test]
    fn test_polls_repeatedly_and_broadcasts() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            status: DeviceStatus::Fire,
        });
        let mut monitor = monitor();
        let rx = monitor.subscribe();

        let mut supervisor = PollSupervisor::new(Duration::from_millis(20));
        supervisor.start(source.clone(), monitor).expect("starts");

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("first snapshot");
        let second = rx.recv_timeout(Duration::from_secs(5)).expect("second snapshot");
        assert_eq!(first.decision.action, AlertAction::Raise);
        assert_eq!(second.decision.action, AlertAction::Refresh);

        let monitor = supervisor.stop().expect("monitor handed back");
        assert!(!supervisor.is_running());
        assert_eq!(monitor.alert_phase(), AlertPhase::Idle, "stop resets alert memory");
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let source: SharedSource = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            status: DeviceStatus::Safe,
        });
        let mut supervisor = PollSupervisor::new(Duration::from_millis(50));
        supervisor.start(Arc::clone(&source), monitor()).expect("first start");
        assert_eq!(
            supervisor.start(source, monitor()),
            Err(FireWatchError::AlreadyRunning)
        );
        assert!(supervisor.is_running());
        assert!(supervisor.stop().is_some());
        assert!(supervisor.stop().is_none(), "stop is idempotent");
    }

    #[test]
    fn test_restart_after_stop_starts_fresh() {
        let source: SharedSource = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            status: DeviceStatus::Fire,
        });
        let mut supervisor = PollSupervisor::new(Duration::from_millis(20));

        let mut first = monitor();
        let rx = first.subscribe();
        supervisor.start(Arc::clone(&source), first).expect("starts");
        rx.recv_timeout(Duration::from_secs(5)).expect("snapshot");
        let recycled = supervisor.stop().expect("monitor back");

        supervisor.start(source, recycled).expect("restarts");
        let snapshot = rx.recv_timeout(Duration::from_secs(5)).expect("snapshot after restart");
        // Drain anything queued before the restart.
        let mut latest = snapshot;
        while latest.decision.action != AlertAction::Raise {
            latest = rx.recv_timeout(Duration::from_secs(5)).expect("raise after restart");
        }
        assert_eq!(latest.decision.action, AlertAction::Raise);
        supervisor.stop();
    }

    #[test]
    fn test_slow_stale_fetch_never_overrides_newer_result() {
        let source = Arc::new(SlowFirstSource {
            calls: AtomicUsize::new(0),
        });
        let mut monitor = monitor();
        let rx = monitor.subscribe();

        let mut supervisor = PollSupervisor::new(Duration::from_millis(50));
        supervisor.start(source, monitor).expect("starts");
        thread::sleep(Duration::from_millis(800));
        supervisor.stop();

        let snapshots: Vec<_> = rx.try_iter().collect();
        assert!(!snapshots.is_empty());
        assert!(
            snapshots.iter().all(|s| s.decision.action == AlertAction::None),
            "the slow fire report from fetch #1 must be discarded"
        );
    }
}
