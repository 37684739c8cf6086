//! Local development proxy applying static-site redirect and rewrite rules.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod rules;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Decision, DecisionKind, RequestContext};
pub use rules::{RuleSet, RuleStore};
