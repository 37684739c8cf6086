//! Redirect and rewrite rule engine.
//!
//! # Data Flow
//! ```text
//! _redirects (plain text) ──┐
//!                           ├─→ source.rs (ordered RawRule list + warnings)
//! netlify.toml [[redirects]]┘
//!     → compiler.rs (pattern.rs + target.rs + conditions → CompiledRule)
//!     → rule_set.rs (immutable RuleSet snapshot)
//!     → RuleStore (ArcSwap, replaced on file change)
//!     → routing::router (first match wins)
//! ```
//!
//! # Design Decisions
//! - Declaration order is authoritative; no specificity sorting
//! - Invalid rules are dropped with a diagnostic, the rest still load
//! - Rule kind is resolved once at compile time

pub mod compiler;
pub mod pattern;
pub mod rule_set;
pub mod source;
pub mod target;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use compiler::{compile_rule, compile_rules, CompiledRule, RuleKind, RuleSummary};
pub use rule_set::{RuleSet, RuleStore};

/// Where a raw rule was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleOrigin {
    /// File the rule was read from.
    pub source: PathBuf,
    /// 1-based line number (plain text) or entry index (structured).
    pub position: usize,
}

impl RuleOrigin {
    pub fn new(source: impl Into<PathBuf>, position: usize) -> Self {
        Self {
            source: source.into(),
            position,
        }
    }
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.display(), self.position)
    }
}

/// A rule as declared, before compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRule {
    pub from: String,
    pub to: String,
    pub status: Option<u16>,
    pub force: bool,
    pub negative: bool,
    /// Query parameters the request must carry; `:name` values capture.
    pub query: BTreeMap<String, String>,
    pub conditions: RawConditions,
    pub origin: RuleOrigin,
}

impl RawRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Request conditions attached to a rule. Empty means always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConditions {
    #[serde(alias = "Host")]
    pub host: Option<String>,

    #[serde(alias = "Scheme")]
    pub scheme: Option<String>,

    #[serde(alias = "Country", deserialize_with = "one_or_many")]
    pub country: Vec<String>,

    #[serde(alias = "Language", deserialize_with = "one_or_many")]
    pub language: Vec<String>,

    #[serde(alias = "Role", deserialize_with = "one_or_many")]
    pub role: Vec<String>,

    #[serde(alias = "Cookie", deserialize_with = "one_or_many")]
    pub cookie: Vec<String>,

    /// Header name to expected value; an empty value only requires presence.
    #[serde(alias = "Headers", alias = "header")]
    pub headers: BTreeMap<String, String>,
}

impl RawConditions {
    pub fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.scheme.is_none()
            && self.country.is_empty()
            && self.language.is_empty()
            && self.role.is_empty()
            && self.cookie.is_empty()
            && self.headers.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Rule loading and compilation failures.
///
/// Everything except [`RuleError::NoRules`] is scoped to a single rule and is
/// normally reported as a warning while the remaining rules still load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("{origin}: malformed rule: {reason}")]
    Malformed { origin: RuleOrigin, reason: String },

    #[error("{origin}: invalid `from` pattern '{pattern}': {reason}")]
    InvalidPattern {
        origin: RuleOrigin,
        pattern: String,
        reason: String,
    },

    #[error("{origin}: invalid `to` target '{target}': {reason}")]
    InvalidTarget {
        origin: RuleOrigin,
        target: String,
        reason: String,
    },

    #[error("{origin}: `to` references ':{name}' which is not captured by the rule")]
    UnresolvedPlaceholder { origin: RuleOrigin, name: String },

    #[error("{origin}: unsupported status {status}")]
    InvalidStatus { origin: RuleOrigin, status: u16 },

    #[error("{origin}: invalid condition: {reason}")]
    InvalidCondition { origin: RuleOrigin, reason: String },

    #[error("{}: unreadable rule source: {reason}", path.display())]
    Source { path: PathBuf, reason: String },

    #[error("no valid redirect rules were loaded")]
    NoRules,
}
