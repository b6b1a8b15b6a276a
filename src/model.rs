/// Core data types for the fire monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// the sensor row as it arrives from the status backend, the sensor history
/// row, and the crate-wide error type. It contains no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sensor status
// ---------------------------------------------------------------------------

/// Status a sensor last reported.
///
/// The backend stores free text ("fire", "safe", "failed"). Matching is
/// case-insensitive; anything else, including a missing value, is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum DeviceStatus {
    Fire,
    Safe,
    Failed,
    Unknown,
}

impl DeviceStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fire" => DeviceStatus::Fire,
            "safe" => DeviceStatus::Safe,
            "failed" => DeviceStatus::Failed,
            _ => DeviceStatus::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            DeviceStatus::Fire => "fire",
            DeviceStatus::Safe => "safe",
            DeviceStatus::Failed => "failed",
            DeviceStatus::Unknown => "unknown",
        }
    }
}

impl From<Option<String>> for DeviceStatus {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(DeviceStatus::from_wire).unwrap_or(DeviceStatus::Unknown)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One row of the backend `status` table.
///
/// Several rows may share a `device_id` (history) or a `location` (sensor
/// reassignment). Which row is "current" is decided by
/// `analysis::reduction::reduce`, never by the row itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "esp32_id")]
    pub device_id: String,
    #[serde(rename = "last_status", default = "unknown_status")]
    pub status: DeviceStatus,
    #[serde(rename = "last_updated", default)]
    pub updated_at: Option<String>, // ISO 8601, e.g. "2025-03-01T10:15:00.123+00:00"
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub system_active: Option<bool>,
}

fn unknown_status() -> DeviceStatus {
    DeviceStatus::Unknown
}

impl SensorReading {
    /// Key used to deduplicate and bucket a physical sensor point: the
    /// location when it is non-empty, otherwise the device id.
    pub fn location_key(&self) -> &str {
        match self.location.as_deref().map(str::trim) {
            Some(loc) if !loc.is_empty() => loc,
            _ => &self.device_id,
        }
    }

    /// `false` only when the backend explicitly marked the device inactive.
    pub fn is_active(&self) -> bool {
        self.system_active != Some(false)
    }

    /// Human label: "location - block", else whichever of the two is set,
    /// else the device id.
    pub fn display_name(&self) -> String {
        let location = non_empty(self.location.as_deref());
        let block = non_empty(self.block.as_deref());
        match (location, block) {
            (Some(l), Some(b)) => format!("{} - {}", l, b),
            (Some(l), None) => l.to_string(),
            (None, Some(b)) => b.to_string(),
            (None, None) => self.device_id.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Sensor history
// ---------------------------------------------------------------------------

/// One row of the backend `logs` table: every report a sensor ever sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(rename = "esp32_id")]
    pub device_id: String,
    #[serde(default = "unknown_status")]
    pub status: DeviceStatus,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// How a history row should be ranked when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Critical,
    Offline,
    Normal,
}

impl LogEntry {
    pub fn severity(&self) -> LogSeverity {
        match self.status {
            DeviceStatus::Fire => LogSeverity::Critical,
            DeviceStatus::Failed => LogSeverity::Offline,
            _ => LogSeverity::Normal,
        }
    }
}

/// Shortens an ISO 8601 timestamp to "YYYY-MM-DD HH:MM" for display.
pub fn format_timestamp(timestamp: Option<&str>) -> String {
    match timestamp {
        Some(ts) if !ts.is_empty() => ts.chars().take(16).collect::<String>().replace('T', " "),
        _ => "Unknown".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when talking to the status backend or preparing
/// its data.
#[derive(Debug, PartialEq)]
pub enum FireWatchError {
    /// Non-2xx HTTP response from the backend.
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    Transport(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// A location or device id could not be mapped onto the building.
    MalformedIdentifier(String),
    /// Configuration file or environment is invalid.
    Config(String),
    /// The poll supervisor was asked to start twice.
    AlreadyRunning,
}

impl FireWatchError {
    /// `true` for the errors that mean "the status source could not be
    /// reached", as opposed to local mistakes.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            FireWatchError::HttpError(_) | FireWatchError::Transport(_) | FireWatchError::ParseError(_)
        )
    }
}

impl std::fmt::Display for FireWatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FireWatchError::HttpError(code) => write!(f, "HTTP error: {}", code),
            FireWatchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FireWatchError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FireWatchError::MalformedIdentifier(id) => write!(f, "Malformed identifier: {:?}", id),
            FireWatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
            FireWatchError::AlreadyRunning => write!(f, "Monitoring is already running"),
        }
    }
}

impl std::error::Error for FireWatchError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
