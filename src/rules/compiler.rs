//! Rule compilation.
//!
//! Turns a [`RawRule`] into a [`CompiledRule`]: a path matcher, a query
//! matcher, a condition matcher and a target template, plus the rule's
//! behaviour resolved once into a [`RuleKind`].

use serde::Serialize;
use url::Url;

use crate::routing::matcher::AndMatcher;
use crate::rules::pattern::{PathPattern, QueryPattern};
use crate::rules::target::{authority_end, is_absolute_url, TargetTemplate, Token};
use crate::rules::{RawRule, RuleError, RuleOrigin};

/// Redirect status codes; everything else is served in place.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// What a matching rule does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleKind {
    /// Serve a local path under the original URL.
    Rewrite { status: u16 },
    /// Send the client elsewhere.
    Redirect { status: u16 },
    /// Fetch an external origin and relay its response.
    Proxy { status: u16 },
    /// Serve the target with 404 when the request would otherwise 404.
    #[serde(rename = "error")]
    ErrorPage,
}

impl RuleKind {
    fn resolve(status: u16, absolute_target: bool) -> Self {
        if REDIRECT_STATUSES.contains(&status) {
            RuleKind::Redirect { status }
        } else if absolute_target {
            RuleKind::Proxy { status }
        } else if status == 404 {
            RuleKind::ErrorPage
        } else {
            RuleKind::Rewrite { status }
        }
    }

    /// The status configured on the rule.
    pub fn status(&self) -> u16 {
        match self {
            RuleKind::Rewrite { status }
            | RuleKind::Redirect { status }
            | RuleKind::Proxy { status } => *status,
            RuleKind::ErrorPage => 404,
        }
    }
}

#[derive(Debug)]
pub struct CompiledRule {
    /// Position in the rule set.
    pub index: usize,
    pub origin: RuleOrigin,
    /// `from` as declared.
    pub from: String,
    /// `to` as declared.
    pub to: String,
    /// Host taken from an absolute `from` URL or a `host` condition.
    pub host: String,
    /// Scheme taken from an absolute `from` URL or a `scheme` condition.
    pub scheme: String,
    pub kind: RuleKind,
    pub force: bool,
    pub negative: bool,
    pub(crate) path: PathPattern,
    pub(crate) query: QueryPattern,
    pub(crate) conditions: AndMatcher,
    pub(crate) target: TargetTemplate,
}

/// Serializable view of a compiled rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub index: usize,
    pub origin: String,
    pub from: String,
    pub to: String,
    pub status: u16,
    pub kind: RuleKind,
    pub force: bool,
    pub negative: bool,
    pub host: String,
    pub scheme: String,
}

impl CompiledRule {
    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            index: self.index,
            origin: self.origin.to_string(),
            from: self.from.clone(),
            to: self.to.clone(),
            status: self.kind.status(),
            kind: self.kind,
            force: self.force,
            negative: self.negative,
            host: self.host.clone(),
            scheme: self.scheme.clone(),
        }
    }
}

/// Compile one rule. `index` is its final position in the rule set.
pub fn compile_rule(index: usize, raw: &RawRule) -> Result<CompiledRule, RuleError> {
    let origin = raw.origin.clone();
    let from = raw.from.trim();
    let to = raw.to.trim();

    let mut conditions = raw.conditions.clone();
    let path_part = if is_absolute_url(from) {
        let url = Url::parse(from).map_err(|e| RuleError::InvalidPattern {
            origin: origin.clone(),
            pattern: from.to_string(),
            reason: e.to_string(),
        })?;
        if conditions.host.is_none() {
            conditions.host = url.host_str().map(str::to_string);
        }
        if conditions.scheme.is_none() {
            conditions.scheme = Some(url.scheme().to_string());
        }
        match &from[authority_end(from)..] {
            "" => "/",
            path => path,
        }
    } else {
        from
    };

    let path = PathPattern::parse(path_part).map_err(|e| RuleError::InvalidPattern {
        origin: origin.clone(),
        pattern: from.to_string(),
        reason: e.0,
    })?;

    let query = QueryPattern::parse(&raw.query).map_err(|e| RuleError::InvalidPattern {
        origin: origin.clone(),
        pattern: from.to_string(),
        reason: e.0,
    })?;

    let target = TargetTemplate::parse(to).map_err(|e| RuleError::InvalidTarget {
        origin: origin.clone(),
        target: to.to_string(),
        reason: e.0,
    })?;

    let mut capture_names: Vec<&str> = path.capture_names().collect();
    for name in query.capture_names() {
        if capture_names.contains(&name) {
            return Err(RuleError::InvalidPattern {
                origin,
                pattern: from.to_string(),
                reason: format!("':{}' is captured twice", name),
            });
        }
        capture_names.push(name);
    }
    for token in target.tokens() {
        let unresolved = match token {
            Token::Named(name) if !capture_names.contains(&name.as_str()) => Some(name.clone()),
            Token::Position(n) if *n > capture_names.len() => Some(n.to_string()),
            _ => None,
        };
        if let Some(name) = unresolved {
            return Err(RuleError::UnresolvedPlaceholder { origin, name });
        }
    }

    let status = raw
        .status
        .unwrap_or(if target.is_absolute() { 301 } else { 200 });
    if !(200..=599).contains(&status) {
        return Err(RuleError::InvalidStatus { origin, status });
    }
    let kind = RuleKind::resolve(status, target.is_absolute());

    let matcher = AndMatcher::from_conditions(&conditions).map_err(|reason| {
        RuleError::InvalidCondition {
            origin: origin.clone(),
            reason,
        }
    })?;

    Ok(CompiledRule {
        index,
        origin,
        from: from.to_string(),
        to: to.to_string(),
        host: conditions.host.as_deref().unwrap_or_default().to_lowercase(),
        scheme: conditions.scheme.as_deref().unwrap_or_default().to_lowercase(),
        kind,
        force: raw.force,
        negative: raw.negative,
        path,
        query,
        conditions: matcher,
        target,
    })
}

/// Compile a batch, keeping declaration order.
///
/// Tolerant mode drops failing rules and returns them as warnings; strict
/// mode fails on the first one.
pub fn compile_rules(
    raws: &[RawRule],
    strict: bool,
) -> Result<(Vec<CompiledRule>, Vec<RuleError>), RuleError> {
    let mut compiled = Vec::with_capacity(raws.len());
    let mut warnings = Vec::new();

    for raw in raws {
        match compile_rule(compiled.len(), raw) {
            Ok(rule) => compiled.push(rule),
            Err(e) if strict => return Err(e),
            Err(e) => warnings.push(e),
        }
    }

    Ok((compiled, warnings))
}
