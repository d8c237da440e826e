//! Runtime configuration
//!
//! Groups the tunables collected by the CLI (flags with environment
//! fallbacks) into one [`AppConfig`] handed to the batch processor and the
//! `categorize` command.

use crate::core::StorePaths;
use crate::strategy::BatchConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 10;
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CONFIG_DIR: &str = "./config";

/// Location and flush policy of the mapping tables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub config_dir: PathBuf,
    /// Flush with a timestamped backup and a full overwrite instead of a merge
    pub overwrite_with_backup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            overwrite_with_backup: false,
        }
    }
}

impl StoreConfig {
    pub fn paths(&self) -> StorePaths {
        StorePaths::in_dir(&self.config_dir)
    }
}

/// Settings of the AI categorization tier
#[derive(Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub timeout: Duration,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

// The key must never end up in logs.
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("enabled", &self.enabled)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl AiConfig {
    /// Build the AI settings
    ///
    /// The tier is enabled only when an API key is present and `disabled` is
    /// false. A zero timeout falls back to the default.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the AI service; blank counts as absent
    /// * `disabled` - Force the tier off (`--no-ai`)
    /// * `requests_per_minute` - Call budget per rolling minute
    /// * `timeout_secs` - Per-request timeout
    pub fn new(
        api_key: Option<String>,
        disabled: bool,
        requests_per_minute: u32,
        timeout_secs: u64,
    ) -> Self {
        let default = Self::default();
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let timeout = if timeout_secs == 0 {
            warn!(
                "invalid AI timeout ({}s), using default ({}s)",
                timeout_secs, DEFAULT_AI_TIMEOUT_SECS
            );
            default.timeout
        } else {
            Duration::from_secs(timeout_secs)
        };

        if requests_per_minute == 0 && api_key.is_some() && !disabled {
            warn!("AI request budget is 0 per minute, the AI tier will never be called");
        }

        Self {
            enabled: api_key.is_some() && !disabled,
            requests_per_minute,
            timeout,
            api_key,
            ..default
        }
    }

    pub fn with_endpoint(mut self, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.model = model.into();
        self
    }
}

/// Complete runtime configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ai: AiConfig,
    pub batch: BatchConfig,
}
