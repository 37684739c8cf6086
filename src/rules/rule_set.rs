//! Rule set snapshots and their owner.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::config::schema::ProjectConfig;
use crate::observability::metrics;
use crate::routing::context::RequestContext;
use crate::routing::router::{self, Decision};
use crate::rules::compiler::{compile_rules, CompiledRule, RuleSummary};
use crate::rules::source::load_rules;
use crate::rules::RuleError;

/// An ordered, immutable collection of compiled rules.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<CompiledRule>) -> Self {
        Self { rules }
    }

    /// Load and compile every rule source of a project.
    ///
    /// Per-rule problems are logged and returned alongside the set. Fails on
    /// the first bad rule when `project.strict`, and when no rule survives
    /// but `project.require_rules` is set.
    pub fn load(project: &ProjectConfig) -> Result<(Self, Vec<RuleError>), RuleError> {
        let parsed = load_rules(project);
        let mut warnings = parsed.warnings;
        if project.strict {
            if let Some(first) = warnings.first() {
                return Err(first.clone());
            }
        }

        let (rules, compile_warnings) = compile_rules(&parsed.rules, project.strict)?;
        warnings.extend(compile_warnings);

        for warning in &warnings {
            tracing::warn!(error = %warning, "Skipping invalid redirect rule");
        }

        if rules.is_empty() && project.require_rules {
            return Err(RuleError::NoRules);
        }

        Ok((Self::new(rules), warnings))
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule, or `None`.
    pub fn match_request(&self, ctx: &RequestContext) -> Option<Decision> {
        router::select(&self.rules, ctx)
    }

    /// Like [`RuleSet::match_request`], with an explicit pass-through decision.
    pub fn decide(&self, ctx: &RequestContext) -> Decision {
        self.match_request(ctx)
            .unwrap_or_else(|| Decision::pass(ctx))
    }

    pub fn summaries(&self) -> Vec<RuleSummary> {
        self.rules.iter().map(CompiledRule::summary).collect()
    }
}

/// Owner of the active rule set.
///
/// Readers take a cheap `Arc` snapshot; reloads build a complete new set and
/// publish it with a single atomic store, so a request never sees a partial
/// rule list.
#[derive(Debug)]
pub struct RuleStore {
    project: ProjectConfig,
    current: ArcSwap<RuleSet>,
}

impl RuleStore {
    /// Build the initial rule set for a project.
    pub fn load(project: ProjectConfig) -> Result<Self, RuleError> {
        let (rule_set, warnings) = RuleSet::load(&project)?;
        tracing::info!(
            rules = rule_set.len(),
            skipped = warnings.len(),
            "Redirect rules loaded"
        );
        Ok(Self::with_rules(project, rule_set))
    }

    pub fn with_rules(project: ProjectConfig, rule_set: RuleSet) -> Self {
        Self {
            project,
            current: ArcSwap::from_pointee(rule_set),
        }
    }

    /// Snapshot of the active rule set.
    pub fn current(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Publish a new rule set.
    pub fn replace(&self, rule_set: RuleSet) {
        self.current.store(Arc::new(rule_set));
    }

    /// Reload from disk. On failure the active set stays in place.
    pub fn reload(&self) -> Result<usize, RuleError> {
        match RuleSet::load(&self.project) {
            Ok((rule_set, _)) => {
                let count = rule_set.len();
                self.replace(rule_set);
                metrics::record_reload(true);
                tracing::info!(rules = count, "Redirect rules reloaded");
                Ok(count)
            }
            Err(e) => {
                metrics::record_reload(false);
                tracing::error!(error = %e, "Failed to reload redirect rules. Keeping current rules.");
                Err(e)
            }
        }
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }
}
