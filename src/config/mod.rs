//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On rule file change:
//!     watcher.rs detects change
//!     → RuleStore::reload (load + compile)
//!     → atomic swap of Arc<RuleSet>
//!     → in-flight requests keep their snapshot
//! ```
//!
//! # Design Decisions
//! - Proxy settings are fixed at startup; only rule files hot-reload
//! - Every section has defaults, so an empty file (or none) is valid
//! - CLI flags override file values before validation

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ProjectConfig, ProxyConfig};
pub use watcher::RulesWatcher;
