//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `TSCAN_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::StoreConfig;
use crate::constants::{
    DEFAULT_COMMIT_EVERY, DEFAULT_COMMIT_INTERVAL_MS, DEFAULT_HOT_CAPACITY, DEFAULT_INFER_CHUNK,
    DEFAULT_WORKERS,
};
use crate::detection::DetectionParameters;
use crate::storage::CommitPolicy;

/// Run configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `TSCAN_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding one record file per group. Default: `./.tscan`.
    pub storage_path: PathBuf,

    /// Classifier weights (safetensors). Overrides `model_path` from the parameters file.
    pub model_path: Option<PathBuf>,

    /// JSON file with [`DetectionParameters`]; defaults apply when absent.
    pub params_path: Option<PathBuf>,

    /// Stage-A tasks in flight. Default: `4`.
    pub workers: usize,

    /// Patches per classifier call. Default: `512`.
    pub infer_chunk: usize,

    /// Records mirrored in memory. Default: `10_000`.
    pub hot_capacity: u64,

    /// Writes staged before a forced commit. Default: `50`.
    pub commit_every: usize,

    /// Maximum age of an uncommitted write in milliseconds. Default: `1000`.
    pub commit_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./.tscan"),
            model_path: None,
            params_path: None,
            workers: DEFAULT_WORKERS,
            infer_chunk: DEFAULT_INFER_CHUNK,
            hot_capacity: DEFAULT_HOT_CAPACITY,
            commit_every: DEFAULT_COMMIT_EVERY,
            commit_interval_ms: DEFAULT_COMMIT_INTERVAL_MS,
        }
    }
}

impl Config {
    const ENV_STORAGE_PATH: &'static str = "TSCAN_STORAGE_PATH";
    const ENV_MODEL_PATH: &'static str = "TSCAN_MODEL_PATH";
    const ENV_PARAMS_PATH: &'static str = "TSCAN_PARAMS_PATH";
    const ENV_WORKERS: &'static str = "TSCAN_WORKERS";
    const ENV_INFER_CHUNK: &'static str = "TSCAN_INFER_CHUNK";
    const ENV_HOT_CAPACITY: &'static str = "TSCAN_HOT_CAPACITY";
    const ENV_COMMIT_EVERY: &'static str = "TSCAN_COMMIT_EVERY";
    const ENV_COMMIT_INTERVAL_MS: &'static str = "TSCAN_COMMIT_INTERVAL_MS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            storage_path: Self::parse_path_from_env(Self::ENV_STORAGE_PATH, defaults.storage_path),
            model_path: Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH),
            params_path: Self::parse_optional_path_from_env(Self::ENV_PARAMS_PATH),
            workers: Self::parse_positive_from_env(Self::ENV_WORKERS, defaults.workers)?,
            infer_chunk: Self::parse_positive_from_env(Self::ENV_INFER_CHUNK, defaults.infer_chunk)?,
            hot_capacity: Self::parse_positive_from_env(
                Self::ENV_HOT_CAPACITY,
                defaults.hot_capacity,
            )?,
            commit_every: Self::parse_positive_from_env(
                Self::ENV_COMMIT_EVERY,
                defaults.commit_every,
            )?,
            commit_interval_ms: Self::parse_positive_from_env(
                Self::ENV_COMMIT_INTERVAL_MS,
                defaults.commit_interval_ms,
            )?,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        for path in [&self.model_path, &self.params_path].into_iter().flatten() {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                name: Self::ENV_WORKERS,
                value: "0".to_string(),
            });
        }
        if self.infer_chunk == 0 {
            return Err(ConfigError::InvalidValue {
                name: Self::ENV_INFER_CHUNK,
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Reads detection parameters from `params_path` (or defaults), applying `model_path`.
    pub fn load_params(&self) -> Result<DetectionParameters, ConfigError> {
        let mut params = match self.params_path {
            Some(ref path) => DetectionParameters::from_json_file(path)?,
            None => DetectionParameters::default(),
        };
        if let Some(ref model) = self.model_path {
            params.model_path = model.clone();
        }
        Ok(params)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            hot_capacity: self.hot_capacity,
            commit: CommitPolicy {
                max_pending: self.commit_every,
                max_delay: Duration::from_millis(self.commit_interval_ms),
            },
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_positive_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr<Err = std::num::ParseIntError> + PartialEq + Default,
    {
        match env::var(var_name) {
            Ok(value) => {
                let parsed: T = value.trim().parse().map_err(|e| ConfigError::ParseError {
                    name: var_name,
                    value: value.clone(),
                    source: e,
                })?;
                if parsed == T::default() {
                    return Err(ConfigError::InvalidValue {
                        name: var_name,
                        value,
                    });
                }
                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }
}
