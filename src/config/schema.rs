//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for the dev proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Project layout: where rules, static output and the framework live.
    pub project: ProjectConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Geolocation used for `country` conditions.
    pub geo: GeoConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Rule introspection endpoint.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8888").
    pub bind_address: String,

    /// Maximum request body buffered before forwarding, in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Where the site lives on disk and where its dev server listens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root. Relative paths below resolve against it.
    pub project_dir: PathBuf,

    /// Static output directory. Defaults to the project root.
    pub dist_dir: Option<PathBuf>,

    /// Base URL of the framework dev server (e.g., "http://localhost:3000").
    /// When unset, only static files are served.
    pub framework_url: Option<String>,

    /// File name of the plain-text redirects file.
    pub redirects_file: String,

    /// File name of the structured site config carrying `[[redirects]]`.
    pub site_config: String,

    /// Reload rules when any rule source changes.
    pub watch: bool,

    /// Abort on the first invalid rule instead of skipping it.
    pub strict: bool,

    /// Fail startup when no valid rule is loaded.
    pub require_rules: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            dist_dir: None,
            framework_url: None,
            redirects_file: "_redirects".to_string(),
            site_config: "netlify.toml".to_string(),
            watch: true,
            strict: false,
            require_rules: false,
        }
    }
}

impl ProjectConfig {
    /// Resolved static output directory.
    pub fn dist_dir(&self) -> PathBuf {
        match &self.dist_dir {
            Some(dir) => self.resolve(dir),
            None => self.project_dir.clone(),
        }
    }

    /// Plain-text rule files in precedence order, de-duplicated.
    pub fn redirects_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.project_dir.join(&self.redirects_file)];
        let in_dist = self.dist_dir().join(&self.redirects_file);
        if !paths.contains(&in_dist) {
            paths.push(in_dist);
        }
        paths
    }

    /// Path of the structured site config.
    pub fn site_config_path(&self) -> PathBuf {
        self.project_dir.join(&self.site_config)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for an upstream (framework or origin) response, in seconds.
    pub upstream_secs: u64,

    /// Total time allowed for a client request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Geolocation settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeoConfig {
    /// ISO country code reported for every request lacking an `X-Country` header.
    pub country: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin (rule introspection) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin endpoint.
    pub enabled: bool,

    /// Bearer token required by the admin endpoint, if any.
    pub api_key: Option<String>,

    /// Admin endpoint bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            bind_address: "127.0.0.1:8889".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [project]
            framework_url = "http://localhost:3000"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:8888");
        assert_eq!(config.project.redirects_file, "_redirects");
        assert_eq!(config.project.framework_url.as_deref(), Some("http://localhost:3000"));
        assert!(config.project.watch);
    }

    #[test]
    fn test_redirects_paths_dedup() {
        let project = ProjectConfig {
            project_dir: PathBuf::from("/site"),
            ..Default::default()
        };
        assert_eq!(project.redirects_paths(), vec![PathBuf::from("/site/_redirects")]);

        let project = ProjectConfig {
            project_dir: PathBuf::from("/site"),
            dist_dir: Some(PathBuf::from("public")),
            ..Default::default()
        };
        assert_eq!(
            project.redirects_paths(),
            vec![
                PathBuf::from("/site/_redirects"),
                PathBuf::from("/site/public/_redirects"),
            ]
        );
        assert_eq!(project.site_config_path(), PathBuf::from("/site/netlify.toml"));
    }
}
