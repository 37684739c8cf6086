//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxy.toml");
        fs::write(
            &path,
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [project]
            dist_dir = "public"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.project.dist_dir.as_deref(), Some(Path::new("public")));
    }

    #[test]
    fn test_load_reports_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxy.toml");
        fs::write(&path, "[timeouts]\nconnect_secs = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("timeouts.connect_secs"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
