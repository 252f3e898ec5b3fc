//! Configuration loading from TOML files
//!
//! The binary picks the path (`--config`, `CONFIG_FILE`, default
//! `config/dev.toml`) and hands it to `Config::load_from_path`.

use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::domain::visit::VISIT_INTERVAL_SECS;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// IANA zone the service renders report times in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Row limit passed to the report query
    #[serde(default = "default_report_limit")]
    pub limit: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { timezone: default_timezone(), limit: default_report_limit() }
    }
}

fn default_timezone() -> String {
    "Pacific/Auckland".to_string()
}

fn default_report_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitsConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for VisitsConfig {
    fn default() -> Self {
        Self { interval_secs: default_interval_secs() }
    }
}

fn default_interval_secs() -> u64 {
    VISIT_INTERVAL_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixturesConfig {
    /// Recording file uploaded for every synthetic recording
    #[serde(default = "default_recording_file")]
    pub recording_file: String,
    /// Sound file uploaded for every audio bait
    #[serde(default = "default_audio_file")]
    pub audio_file: String,
    /// Password given to users and devices the scenarios create
    #[serde(default = "default_user_password")]
    pub user_password: String,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            recording_file: default_recording_file(),
            audio_file: default_audio_file(),
            user_password: default_user_password(),
        }
    }
}

fn default_recording_file() -> String {
    "fixtures/recording.cptv".to_string()
}

fn default_audio_file() -> String {
    "fixtures/audio.mp3".to_string()
}

fn default_user_password() -> String {
    "p@ssw0rd".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub api: ApiConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub visits: VisitsConfig,
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_timeout_ms: u64,
    admin_username: String,
    admin_password: String,
    report_timezone: Tz,
    report_limit: u32,
    visit_interval_secs: u64,
    recording_file: String,
    audio_file: String,
    user_password: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:1080".to_string(),
            api_timeout_ms: default_timeout_ms(),
            admin_username: "admin_test".to_string(),
            admin_password: "admin_test".to_string(),
            report_timezone: chrono_tz::Pacific::Auckland,
            report_limit: default_report_limit(),
            visit_interval_secs: VISIT_INTERVAL_SECS,
            recording_file: default_recording_file(),
            audio_file: default_audio_file(),
            user_password: default_user_password(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let report_timezone: Tz = toml_config.report.timezone.parse().map_err(|e| {
            anyhow::anyhow!("Invalid report timezone {:?}: {}", toml_config.report.timezone, e)
        })?;

        Ok(Self {
            api_base_url: toml_config.api.base_url.trim_end_matches('/').to_string(),
            api_timeout_ms: toml_config.api.timeout_ms,
            admin_username: toml_config.admin.username,
            admin_password: toml_config.admin.password,
            report_timezone,
            report_limit: toml_config.report.limit,
            visit_interval_secs: toml_config.visits.interval_secs,
            recording_file: toml_config.fixtures.recording_file,
            audio_file: toml_config.fixtures.audio_file,
            user_password: toml_config.fixtures.user_password,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout_ms(&self) -> u64 {
        self.api_timeout_ms
    }

    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    pub fn report_timezone(&self) -> Tz {
        self.report_timezone
    }

    pub fn report_limit(&self) -> u32 {
        self.report_limit
    }

    pub fn visit_interval_secs(&self) -> u64 {
        self.visit_interval_secs
    }

    pub fn recording_file(&self) -> &str {
        &self.recording_file
    }

    pub fn audio_file(&self) -> &str {
        &self.audio_file
    }

    pub fn user_password(&self) -> &str {
        &self.user_password
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a local service
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Builder method for tests to point at local fixture files
    pub fn with_fixture_files(mut self, recording_file: &str, audio_file: &str) -> Self {
        self.recording_file = recording_file.to_string();
        self.audio_file = audio_file.to_string();
        self
    }

    /// Builder method for tests to set the report zone
    pub fn with_report_timezone(mut self, tz: Tz) -> Self {
        self.report_timezone = tz;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:1080");
        assert_eq!(config.api_timeout_ms(), 10_000);
        assert_eq!(config.report_timezone(), chrono_tz::Pacific::Auckland);
        assert_eq!(config.report_limit(), 10);
        assert_eq!(config.visit_interval_secs(), 600);
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_api_base_url("http://127.0.0.1:9000/")
            .with_report_timezone(chrono_tz::UTC);
        assert_eq!(config.api_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.report_timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_fixtures_default() {
        let fixtures = FixturesConfig::default();
        assert_eq!(fixtures.recording_file, "fixtures/recording.cptv");
        assert!(!fixtures.user_password.is_empty());
    }
}
