//! Configuration management
//!
//! Settings live in `settings.json` inside the app directory:
//! ```json
//! {
//!   "api": { "baseUrl": "http://localhost:8000/api", "timeoutSecs": 60 },
//!   "idleTimeout": { "enabled": true, "thresholdMinutes": 30, "checkIntervalSecs": 60 }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::result::{Error, Result};
use crate::services::IdlePolicy;

pub const SETTINGS_FILE: &str = "settings.json";

/// Base URL used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_THRESHOLD_MINUTES: u64 = 30;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Environment override for the API base URL
pub const ENV_API_URL: &str = "EXPENSESLOG_API_URL";

/// Environment override for the idle timeout (`on` / `off`)
pub const ENV_IDLE_TIMEOUT: &str = "EXPENSESLOG_IDLE_TIMEOUT";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    api: ApiSettings,
    #[serde(default)]
    idle_timeout: IdleSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdleSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threshold_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check_interval_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Effective configuration (settings file plus environment overrides)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub timeout: Duration,
    pub idle_enabled: bool,
    pub idle_threshold: Duration,
    pub idle_check_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            idle_enabled: true,
            idle_threshold: Duration::from_secs(DEFAULT_THRESHOLD_MINUTES * 60),
            idle_check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

/// Parse an on/off style flag
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Check that `value` is an absolute http(s) URL and return it without a
/// trailing slash
pub fn validate_base_url(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("Invalid API URL '{}': {}", value, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "API URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

fn read_settings(app_dir: &Path) -> Result<SettingsFile> {
    let settings_path = app_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Invalid {}: {}", settings_path.display(), e))
    })
}

impl Config {
    /// Load config from the app directory, then apply environment overrides
    pub fn load(app_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(app_dir)?;

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.base_url = validate_base_url(&url)?;
            }
        }
        if let Ok(flag) = std::env::var(ENV_IDLE_TIMEOUT) {
            config.idle_enabled = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!("{} must be 'on' or 'off', got '{}'", ENV_IDLE_TIMEOUT, flag))
            })?;
        }

        Ok(config)
    }

    /// Load config from the settings file only
    pub fn load_file(app_dir: &Path) -> Result<Self> {
        let raw = read_settings(app_dir)?;
        let defaults = Self::default();

        let base_url = match raw.api.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => validate_base_url(url)?,
            _ => defaults.base_url,
        };

        let threshold_minutes = raw
            .idle_timeout
            .threshold_minutes
            .unwrap_or(DEFAULT_THRESHOLD_MINUTES);
        if threshold_minutes == 0 {
            return Err(Error::Config(
                "idleTimeout.thresholdMinutes must be at least 1".to_string(),
            ));
        }
        let idle_threshold = threshold_from_minutes(threshold_minutes).ok_or_else(|| {
            Error::Config(format!(
                "idleTimeout.thresholdMinutes is too large: {}",
                threshold_minutes
            ))
        })?;

        Ok(Self {
            base_url,
            timeout: raw
                .api
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            idle_enabled: raw.idle_timeout.enabled.unwrap_or(defaults.idle_enabled),
            idle_threshold,
            idle_check_interval: Duration::from_secs(
                raw.idle_timeout
                    .check_interval_secs
                    .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS)
                    .max(1),
            ),
        })
    }

    /// Save config to the app directory, preserving keys not managed here
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(app_dir)?;
        let mut settings = read_settings(app_dir)?;

        settings.api.base_url = Some(self.base_url.clone());
        settings.api.timeout_secs = Some(self.timeout.as_secs());
        settings.idle_timeout.enabled = Some(self.idle_enabled);
        settings.idle_timeout.threshold_minutes = Some(self.idle_threshold.as_secs() / 60);
        settings.idle_timeout.check_interval_secs = Some(self.idle_check_interval.as_secs());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(app_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    pub fn set_base_url(&mut self, url: &str) -> Result<()> {
        self.base_url = validate_base_url(url)?;
        Ok(())
    }

    pub fn set_idle_threshold_minutes(&mut self, minutes: u64) -> Result<()> {
        if minutes == 0 {
            return Err(Error::validation("Idle threshold must be at least 1 minute"));
        }
        self.idle_threshold = threshold_from_minutes(minutes)
            .ok_or_else(|| Error::validation("Idle threshold is too large"))?;
        Ok(())
    }

    /// The idle policy this configuration describes
    pub fn idle_policy(&self) -> IdlePolicy {
        if self.idle_enabled {
            IdlePolicy::new(self.idle_threshold, self.idle_check_interval)
        } else {
            IdlePolicy::disabled()
        }
    }
}

fn threshold_from_minutes(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}
