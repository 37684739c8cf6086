//! Configuration validation.
//!
//! Serde handles syntax; this module checks values (addresses parse, URLs use
//! a supported scheme, timeouts are non-zero). All errors are collected, not
//! just the first.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }

    if let Some(raw) = &config.project.framework_url {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" && url.host().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(
                "project.framework_url",
                format!("'{}' must be an http:// URL with a host", raw),
            )),
            Err(e) => errors.push(ValidationError::new(
                "project.framework_url",
                format!("'{}': {}", raw, e),
            )),
        }
    }

    if config.project.redirects_file.is_empty() {
        errors.push(ValidationError::new("project.redirects_file", "must not be empty"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than zero"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than zero"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "admin.bind_address",
            format!("invalid socket address '{}'", config.admin.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
