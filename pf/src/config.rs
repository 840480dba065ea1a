//! PlanForge configuration types and loading
//!
//! Two layers with different lifetimes: the YAML [`Config`] is read once at
//! startup, while admin-editable state (API keys, prompt override, tuning)
//! lives in the settings store and is resolved into an immutable
//! [`ConfigSnapshot`] at the start of every pipeline invocation.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use planstore::{SettingsStore, StoreError};

use crate::gate::GateConfig;
use crate::gateway::{RetryPolicy, Tuning};
use crate::prompts;

/// Settings-store key for the system prompt override
pub const SYSTEM_PROMPT_SETTING: &str = "system_prompt";

/// Settings-store key for the provider tuning override (JSON [`Tuning`])
pub const TUNING_SETTING: &str = "provider_tuning";

/// Main PlanForge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reasoning provider connection
    pub provider: ProviderConfig,

    /// Concurrency limits
    pub concurrency: ConcurrencyConfig,

    /// Storage paths
    pub storage: StorageConfig,

    /// Job execution bounds
    pub jobs: JobConfig,

    /// Quality flag thresholds for batch results
    pub quality: QualityConfig,

    /// Transient-failure retry bounds
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".planforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planforge").join("planforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Reasoning provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name (currently only "gemini" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Settings-store key holding the API key when the env var is unset
    #[serde(rename = "key-name")]
    pub key_name: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-pro".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            key_name: "gemini".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum concurrent provider calls across all pipelines
    #[serde(rename = "max-provider-calls")]
    pub max_provider_calls: usize,

    /// Maximum provider requests per rate window
    #[serde(rename = "max-requests-per-window")]
    pub max_requests_per_window: u32,

    /// Rate window in seconds
    #[serde(rename = "rate-window-secs")]
    pub rate_window_secs: u64,

    /// Worker pool size for batch sub-pipelines
    #[serde(rename = "batch-workers")]
    pub batch_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_provider_calls: 4,
            max_requests_per_window: 60,
            rate_window_secs: 60,
            batch_workers: 4,
        }
    }
}

impl ConcurrencyConfig {
    pub fn gate(&self) -> GateConfig {
        GateConfig {
            max_concurrent: self.max_provider_calls,
            max_requests_per_window: self.max_requests_per_window,
            rate_window_secs: self.rate_window_secs,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the database and blob store
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("planforge"))
            .unwrap_or_else(|| PathBuf::from(".planforge"))
            .to_string_lossy()
            .into_owned();
        Self { data_dir }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("planforge.db")
    }

    pub fn blob_root(&self) -> PathBuf {
        Path::new(&self.data_dir).join("blobs")
    }
}

/// Job execution bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Maximum total wait for one job before it fails with a timeout detail
    #[serde(rename = "job-timeout-ms")]
    pub job_timeout_ms: u64,

    /// Client poll interval for the CLI
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_timeout_ms: 600_000,
            poll_interval_ms: 1500,
        }
    }
}

impl JobConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Quality flag thresholds for batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Plausible entry count range
    #[serde(rename = "min-rooms")]
    pub min_rooms: usize,
    #[serde(rename = "max-rooms")]
    pub max_rooms: usize,

    /// Fraction of entries allowed to miss area data before flagging
    #[serde(rename = "missing-area-threshold")]
    pub missing_area_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_rooms: 1,
            max_rooms: 120,
            missing_area_threshold: 0.5,
        }
    }
}

/// Transient-failure retry bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

/// Immutable per-pipeline view of admin-editable configuration.
///
/// Taken once at pipeline start and passed by value, so a concurrent admin
/// edit never changes the behavior of an in-flight job.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub api_key: String,
    pub system_prompt: String,
    pub tuning: Tuning,
}

/// Errors taking a configuration snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Provider API key is not configured (checked ${0} and the settings store)")]
    KeyMissing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves configuration snapshots at pipeline start
pub struct SnapshotSource {
    provider: ProviderConfig,
    settings: Arc<SettingsStore>,
}

impl SnapshotSource {
    pub fn new(provider: ProviderConfig, settings: Arc<SettingsStore>) -> Self {
        Self { provider, settings }
    }

    /// Resolve credentials, instructions, and tuning into one snapshot
    pub fn take(&self) -> std::result::Result<ConfigSnapshot, SnapshotError> {
        let api_key = match std::env::var(&self.provider.api_key_env) {
            Ok(value) if !value.is_empty() => value,
            _ => self
                .settings
                .get_api_key(&self.provider.key_name)?
                .ok_or_else(|| SnapshotError::KeyMissing(self.provider.api_key_env.clone()))?,
        };

        let system_prompt = self
            .settings
            .get_setting(SYSTEM_PROMPT_SETTING)?
            .map(|setting| setting.value)
            .unwrap_or_else(|| prompts::DEFAULT_SYSTEM_PROMPT.to_string());

        let tuning = match self.settings.get_setting(TUNING_SETTING)? {
            Some(setting) => serde_json::from_str(&setting.value).unwrap_or_default(),
            None => Tuning::default(),
        };

        debug!(prompt_len = system_prompt.len(), "Took configuration snapshot");
        Ok(ConfigSnapshot {
            api_key,
            system_prompt,
            tuning,
        })
    }
}
