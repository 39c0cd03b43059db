//! Engine configuration
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```
//! use tg_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "strict_type_options": true }"#).unwrap();
//! assert!(config.strict_type_options);
//! assert_eq!(config.workers, 16);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_CACHE_CAPACITY;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of domains in the suffix chain cache
    pub domain_cache_capacity: usize,
    /// Enforce positive `$type` / `$third-party` / `$popup` options.
    /// Off by default: only `~option` requirements gate a rule.
    pub strict_type_options: bool,
    /// Worker threads for batch evaluation
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            domain_cache_capacity: DEFAULT_CACHE_CAPACITY,
            strict_type_options: false,
            workers: 16,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "domain_cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = EngineConfig::from_json_str(r#"{ "workers": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "workers", .. }));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(EngineConfig::from_json_str("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "domain_cache_capacity": 32 }}"#).expect("write config");
        let config = EngineConfig::from_path(file.path()).expect("config should load");
        assert_eq!(config.domain_cache_capacity, 32);
        assert!(!config.strict_type_options);
    }
}
