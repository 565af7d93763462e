//! Configuration loading from and saving to disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and updates.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid update: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Incomplete configuration, missing sections: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),
}

impl ConfigError {
    /// True when the caller supplied bad input rather than the host failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConfigError::Json(_) | ConfigError::Validation(_) | ConfigError::Incomplete(_)
        )
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Persist configuration as TOML.
///
/// Writes a sibling temp file and renames it over the target so readers
/// never observe a half-written file.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    let tmp = path.with_extension("toml.tmp");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("taskhub-{}-{}.toml", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("loader");
        let mut config = AppConfig::default();
        config.retry.max_retries = 7;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.retry.max_retries, 7);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_path("invalid");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::ZeroPort]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/taskhub.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(!err.is_client_error());
    }
}
