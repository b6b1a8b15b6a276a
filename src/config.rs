/// Service configuration.
///
/// Loaded from a TOML file, then overridden from the environment (a `.env`
/// file in the working directory is honoured). The service treats the result
/// as read-only input and never writes it back.
///
/// ```toml
/// [backend]
/// url = "https://abcdefghijklmnopqrst.supabase.co/"
/// api_key = "..."
///
/// [monitoring]
/// poll_interval_secs = 5
/// stale_after_minutes = 10
/// alert_policy = "refresh_on_persist"
///
/// [alerts]
/// emergency_number = "101"
///
/// [logging]
/// level = "info"
/// file = "/var/log/firewatch.log"
/// ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::alert::fire::AlertPolicy;
use crate::logging::LogLevel;
use crate::model::FireWatchError;

pub const ENV_BACKEND_URL: &str = "FIREWATCH_BACKEND_URL";
pub const ENV_API_KEY: &str = "FIREWATCH_API_KEY";
pub const ENV_POLL_INTERVAL: &str = "FIREWATCH_POLL_INTERVAL_SECS";

/// Shortest API key the backend will ever hand out.
const MIN_API_KEY_LEN: usize = 40;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub monitoring: MonitoringConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub maintenance_mode: bool,
    pub poll_interval_secs: u64,
    /// Readings older than this are treated as offline. Disabled when unset.
    pub stale_after_minutes: Option<u64>,
    pub alert_policy: AlertPolicy,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            maintenance_mode: false,
            poll_interval_secs: 5,
            stale_after_minutes: None,
            alert_policy: AlertPolicy::RefreshOnPersist,
        }
    }
}

impl MonitoringConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Number offered as the direct-dial action on every fire alert.
    pub emergency_number: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            emergency_number: "101".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> Result<LogLevel, FireWatchError> {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(FireWatchError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses a TOML document without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self, FireWatchError> {
        toml::from_str(raw).map_err(|e| FireWatchError::Config(e.to_string()))
    }

    /// Reads `path` (when given), applies environment overrides, normalises
    /// and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, FireWatchError> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| FireWatchError::Config(format!("{}: {}", p.display(), e)))?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.finish()
    }

    /// Like `load`, but the backend section may be left empty. Used when
    /// statuses come from a fixture file instead of the backend.
    pub fn load_offline(path: Option<&Path>) -> Result<Self, FireWatchError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| FireWatchError::Config(format!("{}: {}", p.display(), e)))?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.backend.url = normalize_url(&config.backend.url);
        config.validate_local()?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production, a closure in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), FireWatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.backend.api_key = key;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            self.monitoring.poll_interval_secs = raw.trim().parse().map_err(|_| {
                FireWatchError::Config(format!("{} must be a whole number, got '{}'", ENV_POLL_INTERVAL, raw))
            })?;
        }
        Ok(())
    }

    /// Normalises the backend URL and checks every invariant.
    pub fn finish(mut self) -> Result<Self, FireWatchError> {
        self.backend.url = normalize_url(&self.backend.url);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), FireWatchError> {
        self.validate_backend()?;
        self.validate_local()
    }

    fn validate_backend(&self) -> Result<(), FireWatchError> {
        let url = &self.backend.url;
        let host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or("");
        if host.trim_end_matches('/').is_empty() {
            return Err(FireWatchError::Config(format!("backend url '{}' is not an http(s) url", url)));
        }
        if self.backend.api_key.trim().len() < MIN_API_KEY_LEN {
            return Err(FireWatchError::Config(format!(
                "backend api key must be at least {} characters",
                MIN_API_KEY_LEN
            )));
        }
        Ok(())
    }

    /// Checks everything that does not concern the backend.
    fn validate_local(&self) -> Result<(), FireWatchError> {
        if self.monitoring.poll_interval_secs == 0 {
            return Err(FireWatchError::Config("poll_interval_secs must be greater than 0".to_string()));
        }
        if self.alerts.emergency_number.trim().is_empty() {
            return Err(FireWatchError::Config("alerts.emergency_number must not be empty".to_string()));
        }
        self.logging.min_level()?;
        Ok(())
    }
}

/// Adds a scheme when missing and forces a single trailing slash.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid_toml() -> String {
        format!(
            "[backend]\nurl = \"abcdefghijklmnopqrst.supabase.co\"\napi_key = \"{}\"\n",
            "k".repeat(48)
        )
    }

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = Config::default();
        assert!(config.monitoring.enabled);
        assert!(!config.monitoring.maintenance_mode);
        assert_eq!(config.monitoring.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.monitoring.stale_after_minutes, None);
        assert_eq!(config.monitoring.alert_policy, AlertPolicy::RefreshOnPersist);
        assert_eq!(config.alerts.emergency_number, "101");
        assert_eq!(config.backend.timeout_secs, 10);
    }

    #[test]
    fn test_parse_and_normalize() {
        let config = Config::from_toml_str(&valid_toml())
            .and_then(Config::finish)
            .expect("valid config");
        assert_eq!(config.backend.url, "https://abcdefghijklmnopqrst.supabase.co/");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let raw = format!("{}\n[monitoring]\nalert_policy = \"edge_triggered\"\nstale_after_minutes = 10\n", valid_toml());
        let config = Config::from_toml_str(&raw).expect("valid toml");
        assert_eq!(config.monitoring.alert_policy, AlertPolicy::EdgeTriggered);
        assert_eq!(config.monitoring.stale_after_minutes, Some(10));
        assert_eq!(config.monitoring.poll_interval_secs, 5);
        assert!(config.monitoring.enabled);
    }

    #[test]
    fn test_short_api_key_is_rejected() {
        let raw = "[backend]\nurl = \"https://example.supabase.co\"\napi_key = \"short\"\n";
        let result = Config::from_toml_str(raw).and_then(Config::finish);
        assert!(matches!(result, Err(FireWatchError::Config(_))));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let raw = format!("[backend]\napi_key = \"{}\"\n", "k".repeat(48));
        let result = Config::from_toml_str(&raw).and_then(Config::finish);
        assert!(matches!(result, Err(FireWatchError::Config(_))));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let raw = format!("{}\n[monitoring]\npoll_interval_secs = 0\n", valid_toml());
        let result = Config::from_toml_str(&raw).and_then(Config::finish);
        assert!(matches!(result, Err(FireWatchError::Config(_))));
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let mut config = Config::from_toml_str(&valid_toml()).expect("valid toml");
        let env: HashMap<&str, String> = [
            (ENV_BACKEND_URL, "http://localhost:54321".to_string()),
            (ENV_POLL_INTERVAL, "15".to_string()),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|key| env.get(key).cloned())
            .expect("overrides apply");
        let config = config.finish().expect("still valid");
        assert_eq!(config.backend.url, "http://localhost:54321/");
        assert_eq!(config.monitoring.poll_interval_secs, 15);
    }

    #[test]
    fn test_bad_poll_interval_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == ENV_POLL_INTERVAL).then(|| "soon".to_string()));
        assert!(matches!(result, Err(FireWatchError::Config(_))));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let raw = format!("{}\n[logging]\nlevel = \"chatty\"\n", valid_toml());
        let result = Config::from_toml_str(&raw).and_then(Config::finish);
        assert!(matches!(result, Err(FireWatchError::Config(_))));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(valid_toml().as_bytes()).expect("write config");

        let config = Config::load(Some(file.path()));
        // Environment overrides may be present on a developer machine; the
        // file alone must at least parse.
        if std::env::var(ENV_BACKEND_URL).is_err() && std::env::var(ENV_API_KEY).is_err() {
            let config = config.expect("valid config on disk");
            assert_eq!(config.backend.url, "https://abcdefghijklmnopqrst.supabase.co/");
        }
    }

    #[test]
    fn test_offline_load_skips_backend_checks() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[monitoring]\npoll_interval_secs = 2\n").expect("write config");
        let config = Config::load_offline(Some(file.path())).expect("no backend needed");
        assert_eq!(config.monitoring.poll_interval_secs, 2);
        assert!(config.backend.url.is_empty());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.co"), "https://example.co/");
        assert_eq!(normalize_url("http://example.co/"), "http://example.co/");
        assert_eq!(normalize_url("  "), "");
    }
}
