//! rules-proxy
//!
//! Development proxy that reproduces a static host's redirect, rewrite and
//! proxy rules in front of a framework dev server or a build output
//! directory.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                       RULES PROXY                          │
//!                    │                                                            │
//!  Client Request    │  ┌─────────┐    ┌─────────────┐    ┌──────────────┐       │
//!  ──────────────────┼─▶│  http   │───▶│   routing   │───▶│    proxy     │       │
//!                    │  │ server  │    │  (decide)   │    │  (execute)   │       │
//!                    │  └─────────┘    └──────┬──────┘    └──────┬───────┘       │
//!                    │                        │                  │               │
//!                    │                 ┌──────┴──────┐   ┌───────┼────────┐      │
//!                    │                 │    rules    │   ▼       ▼        ▼      │
//!                    │                 │ (RuleStore) │ static  framework  origin │
//!                    │                 └──────▲──────┘  files  dev server  URL   │
//!                    │                        │                                  │
//!                    │        _redirects / netlify.toml  (watched, hot reload)   │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use rules_proxy::config::loader::load_config;
use rules_proxy::config::ProxyConfig;
use rules_proxy::lifecycle::startup;
use rules_proxy::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "rules-proxy")]
#[command(about = "Local dev proxy applying _redirects and netlify.toml rules", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root holding the rule files.
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Static output directory, relative to the project root.
    #[arg(long)]
    dist_dir: Option<PathBuf>,

    /// Framework dev server, e.g. http://localhost:3000.
    #[arg(long)]
    framework_url: Option<String>,

    /// Listen address, e.g. 127.0.0.1:8888.
    #[arg(short, long)]
    bind: Option<String>,

    /// Fail on the first invalid rule instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Do not reload rules when their files change.
    #[arg(long)]
    no_watch: bool,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(dir) = self.project_dir {
            config.project.project_dir = dir;
        }
        if let Some(dir) = self.dist_dir {
            config.project.dist_dir = Some(dir);
        }
        if let Some(url) = self.framework_url {
            config.project.framework_url = Some(url);
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if self.strict {
            config.project.strict = true;
        }
        if self.no_watch {
            config.project.watch = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    let mut config = match cli.config.take() {
        Some(path) => load_config(&path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    init_logging(&config.observability.log_level);
    tracing::info!("rules-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config).await?;
    Ok(())
}
