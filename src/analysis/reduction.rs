//! Latest-status reduction and building classification.
//!
//! The backend returns every status row it has, newest first. Rows may
//! repeat a device (history) or a location (a sensor moved or replaced).
//! `reduce` keeps the first row seen per location key and derives the
//! building-wide state from what is left.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::model::{DeviceStatus, SensorReading};

// ---------------------------------------------------------------------------
// Reduced types
// ---------------------------------------------------------------------------

/// What a single location shows once maintenance is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationStatus {
    Fire,
    Offline,
    Maintenance,
    Safe,
}

impl LocationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LocationStatus::Fire => "Fire",
            LocationStatus::Offline => "Offline",
            LocationStatus::Maintenance => "Maintenance",
            LocationStatus::Safe => "Safe",
        }
    }
}

/// Building-wide classification, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallState {
    Maintenance,
    Fire,
    AllOffline,
    PartialOffline,
    Safe,
    NoDevices,
}

/// One snapshot of the building, recomputed from scratch on every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducedState {
    /// The retained rows, in the order the backend returned them.
    pub retained: Vec<SensorReading>,
    pub per_location: BTreeMap<String, LocationStatus>,
    pub fire_locations: BTreeSet<String>,
    pub offline_locations: BTreeSet<String>,
    pub overall_state: OverallState,
    pub last_updated_at: Option<String>,
    pub system_active: bool,
}

impl ReducedState {
    pub fn device_count(&self) -> usize {
        self.retained.len()
    }

    /// Display names of the retained rows currently reporting fire, in
    /// backend order.
    pub fn fire_display_names(&self) -> Vec<String> {
        self.retained
            .iter()
            .filter(|r| self.fire_locations.contains(r.location_key()))
            .map(|r| r.display_name())
            .collect()
    }

    /// One-line description suitable for a status banner.
    pub fn headline(&self) -> String {
        let total = self.device_count();
        match self.overall_state {
            OverallState::Maintenance => "System in maintenance mode".to_string(),
            OverallState::Fire => format!("FIRE ALERT - {} location(s)", self.fire_locations.len()),
            OverallState::AllOffline => {
                format!("All devices offline - {} location(s)", self.offline_locations.len())
            }
            OverallState::PartialOffline => format!(
                "{} device(s) offline - {} safe",
                self.offline_locations.len(),
                total - self.offline_locations.len()
            ),
            OverallState::Safe => "All areas are safe".to_string(),
            OverallState::NoDevices => "No devices registered".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reduction
// ---------------------------------------------------------------------------

/// Reduces raw status rows (newest first) to one record per location.
///
/// Steps:
///   1. keep the first row per location key (location, else device id);
///   2. any retained row with `system_active == false` puts the whole
///      building into maintenance;
///   3. bucket each retained row into fire / maintenance / offline / safe
///      using that row's own activity flag;
///   4. `last_updated_at` is the newest retained timestamp;
///   5. classify, first match wins: Maintenance, Fire, AllOffline,
///      PartialOffline, Safe, NoDevices.
pub fn reduce(rows: &[SensorReading]) -> ReducedState {
    let mut seen: HashSet<&str> = HashSet::new();
    let retained: Vec<SensorReading> = rows
        .iter()
        .filter(|row| seen.insert(row.location_key()))
        .cloned()
        .collect();

    let system_active = retained.iter().all(SensorReading::is_active);

    let mut per_location = BTreeMap::new();
    let mut fire_locations = BTreeSet::new();
    let mut offline_locations = BTreeSet::new();

    for row in &retained {
        let key = row.location_key().to_string();
        let status = if row.is_active() && row.status == DeviceStatus::Fire {
            fire_locations.insert(key.clone());
            LocationStatus::Fire
        } else if !row.is_active() {
            LocationStatus::Maintenance
        } else if row.status == DeviceStatus::Failed {
            offline_locations.insert(key.clone());
            LocationStatus::Offline
        } else {
            LocationStatus::Safe
        };
        per_location.insert(key, status);
    }

    let last_updated_at = retained
        .iter()
        .filter_map(|r| r.updated_at.as_deref())
        .max_by(|a, b| compare_timestamps(a, b))
        .map(String::from);

    let overall_state = classify(
        system_active,
        fire_locations.len(),
        offline_locations.len(),
        retained.len(),
    );

    ReducedState {
        retained,
        per_location,
        fire_locations,
        offline_locations,
        overall_state,
        last_updated_at,
        system_active,
    }
}

fn classify(system_active: bool, fires: usize, offline: usize, total: usize) -> OverallState {
    if !system_active {
        OverallState::Maintenance
    } else if fires > 0 {
        OverallState::Fire
    } else if offline > 0 && offline == total {
        OverallState::AllOffline
    } else if offline > 0 {
        OverallState::PartialOffline
    } else if total > 0 {
        OverallState::Safe
    } else {
        OverallState::NoDevices
    }
}

/// Orders two backend timestamps.
///
/// Timestamps are compared as instants. One without an offset is read as
/// UTC. Anything that does not parse sorts before every parseable value and
/// lexicographically among its own kind, so the order stays total.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_instant(a), parse_instant(b)) {
        (Some(ta), Some(tb)) => ta.cmp(&tb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
