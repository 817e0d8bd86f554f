use super::error::EngineError;
use super::retry::RetryPolicy;
use crate::model::Vintage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run settings. Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time period label, also the first cache key component.
    pub year: String,
    /// Source family label used in cache keys.
    pub source: String,
    pub vintage: Vintage,
    pub workers: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Selects the file-backed result store when set.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            year: "2019".to_string(),
            source: "acs".to_string(),
            vintage: Vintage::default(),
            workers: 5,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            cache_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config { path: path.to_path_buf(), msg: e.to_string() })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config { path: path.to_path_buf(), msg: e.to_string() })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), EngineError> {
        let invalid = |msg: &str| Err(EngineError::Config { path: path.to_path_buf(), msg: msg.to_string() });
        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if self.retry_attempts == 0 {
            return invalid("retry_attempts must be at least 1");
        }
        if self.year.is_empty() {
            return invalid("year must not be empty");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { attempts: self.retry_attempts.max(1), delay: Duration::from_millis(self.retry_delay_ms) }
    }
}
