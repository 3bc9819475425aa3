//! Client configuration
//!
//! Loaded from `<config dir>/comunicados/config.toml`. The backend address is
//! never compiled in; an empty `base_url` means the client is not configured.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::announcements::error::{AnnouncementError, AnnouncementResult};

pub const BASE_URL_ENV: &str = "COMUNICADOS_BASE_URL";
pub const PROFESSOR_EMAIL_ENV: &str = "COMUNICADOS_PROFESSOR_EMAIL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the announcement service, e.g. `http://10.0.0.5:5000`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Name shown on the attendance card
    pub student_name: String,

    /// Author name attached to new announcements
    pub professor_name: String,

    /// Scope key for the professor panel
    pub professor_email: String,

    /// Body preview length in the feed, in characters
    pub preview_chars: usize,

    /// chrono format string for feed timestamps
    pub timestamp_format: String,

    /// Offset applied to timestamps before formatting
    pub utc_offset_minutes: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: 10,
            student_name: String::new(),
            professor_name: String::new(),
            professor_email: String::new(),
            preview_chars: 80,
            timestamp_format: "%d/%m/%Y %H:%M".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("comunicados").join("config.toml"))
    }

    /// Load configuration from file, falling back to defaults when absent
    pub async fn load_from_file(path: &Path) -> AnnouncementResult<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AnnouncementError::config(format!("Failed to read config: {}", e)))?;

        let config: ClientConfig = toml::from_str(&content)
            .map_err(|e| AnnouncementError::config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> AnnouncementResult<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| AnnouncementError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AnnouncementError::config(format!("Failed to create config directory: {}", e)))?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| AnnouncementError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(BASE_URL_ENV).ok(),
            std::env::var(PROFESSOR_EMAIL_ENV).ok(),
        );
    }

    /// Replace base URL and professor email when a non-empty value is given
    pub fn apply_overrides(&mut self, base_url: Option<String>, professor_email: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(email) = professor_email.filter(|e| !e.trim().is_empty()) {
            self.professor_email = email;
        }
    }

    /// Validate configuration settings
    pub fn validate(&self) -> AnnouncementResult<()> {
        if !self.base_url.is_empty() {
            url::Url::parse(&self.base_url)
                .map_err(|e| AnnouncementError::config(format!("Invalid base_url: {}", e)))?;
        }

        if self.request_timeout_secs == 0 {
            return Err(AnnouncementError::config("request_timeout_secs must be greater than 0"));
        }

        if self.preview_chars == 0 {
            return Err(AnnouncementError::config("preview_chars must be greater than 0"));
        }

        if self.timestamp_format.trim().is_empty() {
            return Err(AnnouncementError::config("timestamp_format must not be empty"));
        }

        self.utc_offset()?;
        Ok(())
    }

    /// The base URL, or an error telling the user to configure one
    pub fn require_base_url(&self) -> AnnouncementResult<&str> {
        if self.base_url.trim().is_empty() {
            return Err(AnnouncementError::config(format!(
                "No backend configured; set base_url in the config file or {}",
                BASE_URL_ENV
            )));
        }
        Ok(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn utc_offset(&self) -> AnnouncementResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AnnouncementError::config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}
