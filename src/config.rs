//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.coursescan.toml` files and building the explicit API settings
//! handed to the HTTP client.

use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".coursescan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Canvas API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Conclude pass settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Maximum number of courses inspected at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_concurrency() -> usize {
    10
}

/// Canvas API settings (credentials come from the environment, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Account whose courses are searched.
    #[serde(default = "default_account_id")]
    pub account_id: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            account_id: default_account_id(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_account_id() -> u64 {
    1
}

/// Conclude pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Pause between the audit and the conclude pass, for API rate limits.
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,

    /// Report what would be concluded without changing anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown(),
            dry_run: false,
        }
    }
}

fn default_cooldown() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(cooldown) = args.cooldown {
            self.workflow.cooldown_seconds = cooldown;
        }

        // Flags always override
        if args.dry_run {
            self.workflow.dry_run = true;
        }
    }

    /// Build the API settings from this config and the supplied credentials.
    pub fn api_settings(
        &self,
        token: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<ApiSettings, ConfigError> {
        ApiSettings::new(
            token.unwrap_or_default(),
            base_url.unwrap_or_default(),
            Duration::from_secs(self.api.timeout_seconds),
            self.api.account_id,
        )
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Everything the HTTP client needs, passed in explicitly.
#[derive(Clone)]
pub struct ApiSettings {
    pub token: String,
    /// Always ends with `/` so relative endpoints join below it.
    pub base_url: Url,
    pub timeout: Duration,
    pub account_id: u64,
}

impl ApiSettings {
    /// Validate credentials and normalize the base URL.
    pub fn new(
        token: &str,
        base_url: &str,
        timeout: Duration,
        account_id: u64,
    ) -> Result<Self, ConfigError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingCredential("CANVAS_TOKEN"));
        }

        let raw = base_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingCredential("CANVAS_API_URL"));
        }

        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };

        let base_url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: raw.to_string(),
                reason: "must start with 'http://' or 'https://'".to_string(),
            });
        }

        Ok(Self {
            token: token.to_string(),
            base_url,
            timeout,
            account_id,
        })
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("account_id", &self.account_id)
            .finish()
    }
}
