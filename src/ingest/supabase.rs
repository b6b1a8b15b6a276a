/// Status backend REST client.
///
/// The sensor gateway writes every report into two PostgREST tables:
/// `status` (one upserted row per device) and `logs` (append-only history).
/// This client reads both and patches `status` for maintenance toggles and
/// location edits.
///
/// Every request carries the project key twice, as `apikey` and as a bearer
/// token, which is what the REST gateway expects.

use std::time::Duration;

use serde::Serialize;

use crate::config::BackendConfig;
use crate::ingest::{DeviceControl, StatusSource};
use crate::model::{FireWatchError, LogEntry, SensorReading};

/// Number of history rows fetched when no limit is given.
pub const DEFAULT_LOG_LIMIT: usize = 50;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Serialize)]
struct SystemActivePatch {
    system_active: bool,
}

#[derive(Debug, Serialize)]
struct LocationPatch<'a> {
    location: Option<&'a str>,
    block: Option<&'a str>,
}

// ============================================================================
// Client
// ============================================================================

pub struct SupabaseClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, FireWatchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FireWatchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the URL of a REST table with its query parameters encoded,
    /// e.g. `table_url("status", &[("select", "*")])`.
    pub fn table_url(&self, table: &str, params: &[(&str, &str)]) -> Result<reqwest::Url, FireWatchError> {
        let base = format!("{}rest/v1/{}", self.base_url, table);
        reqwest::Url::parse_with_params(&base, params)
            .map_err(|e| FireWatchError::Config(format!("invalid backend URL {}: {}", base, e)))
    }

    fn get(&self, url: reqwest::Url) -> Result<reqwest::blocking::Response, FireWatchError> {
        let response = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FireWatchError::Transport(e.to_string()))?;

        check_status(response)
    }

    fn patch<B: Serialize>(&self, url: reqwest::Url, body: &B) -> Result<(), FireWatchError> {
        let response = self
            .http
            .patch(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| FireWatchError::Transport(e.to_string()))?;

        check_status(response).map(|_| ())
    }

    /// Latest history rows across all devices, newest first.
    pub fn fetch_logs(&self, limit: usize) -> Result<Vec<LogEntry>, FireWatchError> {
        let limit = limit.to_string();
        let url = self.table_url(
            "logs",
            &[("select", "*"), ("order", "timestamp.desc"), ("limit", &limit)],
        )?;
        let body = self.get(url)?.text().map_err(|e| FireWatchError::Transport(e.to_string()))?;
        parse_logs(&body)
    }

    /// Full history of one device, newest first.
    pub fn fetch_device_logs(&self, device_id: &str) -> Result<Vec<LogEntry>, FireWatchError> {
        let url = self.device_logs_url(device_id)?;
        let body = self.get(url)?.text().map_err(|e| FireWatchError::Transport(e.to_string()))?;
        parse_logs(&body)
    }

    fn device_logs_url(&self, device_id: &str) -> Result<reqwest::Url, FireWatchError> {
        let filter = format!("eq.{}", device_id);
        self.table_url(
            "logs",
            &[("select", "*"), ("order", "timestamp.desc"), ("esp32_id", &filter)],
        )
    }

    /// `status` rows of one device, the target of every PATCH.
    fn device_status_url(&self, device_id: &str) -> Result<reqwest::Url, FireWatchError> {
        let filter = format!("eq.{}", device_id);
        self.table_url("status", &[("esp32_id", &filter)])
    }
}

impl StatusSource for SupabaseClient {
    fn fetch_status(&self) -> Result<Vec<SensorReading>, FireWatchError> {
        let url = self.table_url("status", &[("select", "*"), ("order", "last_updated.desc")])?;
        let body = self.get(url)?.text().map_err(|e| FireWatchError::Transport(e.to_string()))?;
        parse_status(&body)
    }
}

impl DeviceControl for SupabaseClient {
    fn set_system_active(&self, device_id: &str, active: bool) -> Result<(), FireWatchError> {
        let url = self.device_status_url(device_id)?;
        self.patch(url, &SystemActivePatch { system_active: active })
    }

    fn update_location(&self, device_id: &str, location: &str, block: &str) -> Result<(), FireWatchError> {
        let url = self.device_status_url(device_id)?;
        let body = LocationPatch {
            location: Some(location.trim()).filter(|l| !l.is_empty()),
            block: Some(block.trim()).filter(|b| !b.is_empty()),
        };
        self.patch(url, &body)
    }
}

// ============================================================================
// Response handling
// ============================================================================

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, FireWatchError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(FireWatchError::HttpError(response.status().as_u16()))
    }
}

/// Parses the body of a `status` table query.
pub fn parse_status(body: &str) -> Result<Vec<SensorReading>, FireWatchError> {
    serde_json::from_str(body).map_err(|e| FireWatchError::ParseError(e.to_string()))
}

/// Parses the body of a `logs` table query.
pub fn parse_logs(body: &str) -> Result<Vec<LogEntry>, FireWatchError> {
    serde_json::from_str(body).map_err(|e| FireWatchError::ParseError(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
