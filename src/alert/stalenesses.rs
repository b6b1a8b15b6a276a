/// Sensor staleness detection.
///
/// Sensors report on every state change and periodically otherwise. A sensor
/// that has gone quiet may have lost power or network, and a silent sensor
/// in a burning room looks exactly like a safe one. When enabled, readings
/// older than the configured age are treated as `Failed` before reduction so
/// they surface as offline.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally. This makes staleness purely deterministic in
/// tests without mocking or time manipulation.

use chrono::{DateTime, Utc};

use crate::model::{DeviceStatus, FireWatchError, SensorReading};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the reading's timestamp is older than `max_age_minutes`
/// relative to `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Returns an error if the reading has no timestamp or it cannot be parsed.
/// Callers should treat parse failures as stale (fail-safe default).
pub fn is_stale_at(
    reading: &SensorReading,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Result<bool, FireWatchError> {
    let raw = reading
        .updated_at
        .as_deref()
        .ok_or_else(|| FireWatchError::ParseError(format!("{} has no timestamp", reading.device_id)))?;

    let updated = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| FireWatchError::ParseError(format!("{}: {}", raw, e)))?
        .with_timezone(&Utc);

    let age_minutes = (now - updated).num_minutes();
    Ok(age_minutes > 0 && age_minutes as u64 > max_age_minutes)
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(reading: &SensorReading, max_age_minutes: u64) -> Result<bool, FireWatchError> {
    is_stale_at(reading, max_age_minutes, Utc::now())
}

// ---------------------------------------------------------------------------
// Marking
// ---------------------------------------------------------------------------

/// Rewrites stale, non-fire readings to `Failed`.
///
/// Fire is never downgraded: an old fire report stays a fire until the
/// sensor says otherwise.
pub fn mark_stale_at(
    rows: Vec<SensorReading>,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Vec<SensorReading> {
    rows.into_iter()
        .map(|mut row| {
            if row.status != DeviceStatus::Fire
                && is_stale_at(&row, max_age_minutes, now).unwrap_or(true)
            {
                row.status = DeviceStatus::Failed;
            }
            row
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
