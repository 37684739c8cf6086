//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Load the initial rule set and start the rule watcher
//! - Start background tasks (metrics, admin listener)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;
use crate::config::watcher::RulesWatcher;
use crate::http::HttpServer;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::UpstreamError;
use crate::rules::{RuleError, RuleStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load redirect rules: {0}")]
    Rules(#[from] RuleError),

    #[error("failed to create upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to watch rule files: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Run the proxy until a shutdown signal arrives.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        project_dir = %config.project.project_dir.display(),
        dist_dir = %config.project.dist_dir().display(),
        framework_url = ?config.project.framework_url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(RuleStore::load(config.project.clone())?);

    // Dropping the watcher stops it; keep it for the server's lifetime.
    let _watcher = if config.project.watch {
        Some(RulesWatcher::new(store.clone()).run()?)
    } else {
        None
    };

    let admin_config = config.admin.clone();
    let listener = bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, store)?;

    let shutdown = Arc::new(Shutdown::new());

    let admin_task = if admin_config.enabled {
        let admin_listener = bind(&admin_config.bind_address).await?;
        tracing::info!(address = %admin_config.bind_address, "Admin endpoint listening");
        let app = setup_admin_router(server.state().clone());
        let mut admin_shutdown = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    if let Some(task) = admin_task {
        match task.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "Admin server task failed"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_config_fails_fast() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not an address".to_string();
        assert!(matches!(
            run(config).await,
            Err(StartupError::Config(ConfigError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_required_rules_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.project.project_dir = dir.path().to_path_buf();
        config.project.require_rules = true;
        assert!(matches!(
            run(config).await,
            Err(StartupError::Rules(RuleError::NoRules))
        ));
    }
}
