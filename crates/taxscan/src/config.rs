//! Queue configuration.
//!
//! Everything has a sensible default; `from_env` overlays the environment
//! knobs an embedding backend typically sets, including the deterministic
//! test mode toggle.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_STORE_PATH: &str = "TAXSCAN_STORE_PATH";
pub const ENV_WORKER_COUNT: &str = "TAXSCAN_WORKER_COUNT";
pub const ENV_OCR_MODE: &str = "TAXSCAN_OCR_MODE";
pub const ENV_JOB_TIMEOUT_SECS: &str = "TAXSCAN_JOB_TIMEOUT_SECS";
pub const ENV_OCR_COMMAND: &str = "TAXSCAN_OCR_COMMAND";

/// How extraction results are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Run the configured recognition engine.
    #[default]
    Engine,
    /// Deterministic short-circuit: every job completes synchronously with
    /// [`crate::engine::MOCK_OCR_TEXT`] and no engine is ever invoked. Exists
    /// purely so external test suites see stable results.
    Mock,
}

/// Recognition settings handed to whichever engine the embedding app builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// External recognizer command line for [`crate::engine::CommandEngine`];
    /// the job's file path is appended as the final argument.
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: default_dpi(),
            command: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Location of the flat job-table file.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Number of extraction workers. Caps concurrent OCR work; submission
    /// itself is never bounded.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub mode: OcrMode,
    /// Upper bound on a single extraction. `None` lets a hung engine occupy
    /// its execution unit forever, matching the queue's historical behavior.
    #[serde(default)]
    pub job_timeout: Option<Duration>,
    #[serde(default)]
    pub ocr: OcrSettings,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("uploads/ocr-jobs.json")
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            worker_count: default_worker_count(),
            mode: OcrMode::default(),
            job_timeout: None,
            ocr: OcrSettings::default(),
        }
    }
}

impl QueueConfig {
    /// Builds a config from defaults overlaid with the `TAXSCAN_*`
    /// environment variables. Unset variables keep their defaults; set but
    /// invalid values are errors rather than silent fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_STORE_PATH) {
            if !value.is_empty() {
                config.store_path = PathBuf::from(value);
            }
        }

        if let Ok(value) = std::env::var(ENV_WORKER_COUNT) {
            let count: usize = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_WORKER_COUNT.to_string(),
                reason: format!("'{}' is not a valid worker count", value),
            })?;
            if count == 0 {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_WORKER_COUNT.to_string(),
                    reason: "worker count must be greater than zero".to_string(),
                });
            }
            config.worker_count = count;
        }

        if let Ok(value) = std::env::var(ENV_OCR_MODE) {
            config.mode = match value.as_str() {
                "mock" => OcrMode::Mock,
                "engine" | "" => OcrMode::Engine,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_OCR_MODE.to_string(),
                        reason: format!("'{}' is not one of: engine, mock", other),
                    })
                }
            };
        }

        if let Ok(value) = std::env::var(ENV_JOB_TIMEOUT_SECS) {
            let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_JOB_TIMEOUT_SECS.to_string(),
                reason: format!("'{}' is not a valid number of seconds", value),
            })?;
            // 0 keeps timeouts disabled.
            config.job_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(value) = std::env::var(ENV_OCR_COMMAND) {
            config.ocr.command = value.split_whitespace().map(String::from).collect();
        }

        Ok(config)
    }
}
