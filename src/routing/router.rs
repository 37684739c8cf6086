//! Rule selection.
//!
//! # Responsibilities
//! - Walk compiled rules in declaration order
//! - Return the first rule whose path, query and conditions all match
//! - Render the concrete target from the captures
//!
//! # Design Decisions
//! - Pure and lock-free over an immutable snapshot
//! - First match wins; rule order is never rearranged by specificity
//! - Explicit pass-through decision rather than silent default

use serde::Serialize;
use std::collections::BTreeMap;

use crate::routing::context::RequestContext;
use crate::routing::matcher::Matcher;
use crate::rules::compiler::{CompiledRule, RuleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Pass,
    Rewrite,
    Redirect,
    Proxy,
    Error,
}

/// Outcome of matching one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub kind: DecisionKind,
    /// `from` of the matched rule, or the request path for pass-through.
    pub from: String,
    /// Concrete target with captures substituted.
    pub to: String,
    pub status: u16,
    pub force: bool,
    pub negative: bool,
    pub host: String,
    pub scheme: String,
    pub params: BTreeMap<String, String>,
    /// An existing static file at the request path wins over this decision.
    pub shadowable: bool,
    /// Position of the matched rule in the rule set.
    pub rule: Option<usize>,
}

impl Decision {
    pub fn pass(ctx: &RequestContext) -> Self {
        Self {
            kind: DecisionKind::Pass,
            from: ctx.path.clone(),
            to: ctx.path_and_query(),
            status: 200,
            force: false,
            negative: false,
            host: String::new(),
            scheme: String::new(),
            params: BTreeMap::new(),
            shadowable: false,
            rule: None,
        }
    }
}

/// Return the first rule matching the request.
pub fn select(rules: &[CompiledRule], ctx: &RequestContext) -> Option<Decision> {
    rules.iter().find_map(|rule| evaluate(rule, ctx))
}

fn evaluate(rule: &CompiledRule, ctx: &RequestContext) -> Option<Decision> {
    let mut captures = rule.path.matches(&ctx.path)?;
    if !rule.query.matches(&ctx.query, &mut captures) {
        return None;
    }

    // A negative rule with no conditions never matches.
    let satisfied = rule.conditions.matches(ctx);
    if satisfied == rule.negative {
        return None;
    }

    let mut to = rule.target.render(&captures);
    if rule.query.is_empty() && !to.contains('?') {
        if let Some(query) = &ctx.raw_query {
            to.push('?');
            to.push_str(query);
        }
    }

    let kind = match rule.kind {
        RuleKind::Rewrite { .. } => DecisionKind::Rewrite,
        RuleKind::Redirect { .. } => DecisionKind::Redirect,
        RuleKind::Proxy { .. } => DecisionKind::Proxy,
        RuleKind::ErrorPage => DecisionKind::Error,
    };

    Some(Decision {
        kind,
        from: rule.from.clone(),
        to,
        status: rule.kind.status(),
        force: rule.force,
        negative: rule.negative,
        host: rule.host.clone(),
        scheme: rule.scheme.clone(),
        params: captures.to_map(),
        shadowable: !rule.force && kind != DecisionKind::Error,
        rule: Some(rule.index),
    })
}
