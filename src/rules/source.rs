//! Rule source loading.
//!
//! # Responsibilities
//! - Parse the plain-text redirects file (`from [k=v..] to [status[!]] [Cond=v,..]`)
//! - Parse the `[[redirects]]` array of the structured site config
//! - Concatenate sources in precedence order: plain text first
//!
//! # Design Decisions
//! - A missing source contributes nothing; it is not an error
//! - A malformed line or entry is skipped with a warning
//! - Sources are an ordered list of (path, parser) pairs tried one by one

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::schema::ProjectConfig;
use crate::rules::target::is_absolute_url;
use crate::rules::{RawConditions, RawRule, RuleError, RuleOrigin};

/// Rules parsed from one or more sources, with per-rule diagnostics.
#[derive(Debug, Default)]
pub struct Parsed {
    pub rules: Vec<RawRule>,
    pub warnings: Vec<RuleError>,
}

impl Parsed {
    fn extend(&mut self, other: Parsed) {
        self.rules.extend(other.rules);
        self.warnings.extend(other.warnings);
    }
}

type Parser = fn(&Path, &str) -> Parsed;

/// Every rule source of a project, in precedence order.
pub fn rule_sources(project: &ProjectConfig) -> Vec<(PathBuf, Parser)> {
    let mut sources: Vec<(PathBuf, Parser)> = project
        .redirects_paths()
        .into_iter()
        .map(|p| (p, parse_redirects_file as Parser))
        .collect();
    sources.push((project.site_config_path(), parse_site_config as Parser));
    sources
}

/// Read and parse all rule sources of a project.
pub fn load_rules(project: &ProjectConfig) -> Parsed {
    let mut parsed = Parsed::default();

    for (path, parser) in rule_sources(project) {
        match fs::read_to_string(&path) {
            Ok(content) => {
                let from_source = parser(&path, &content);
                tracing::debug!(
                    source = %path.display(),
                    rules = from_source.rules.len(),
                    "Loaded rule source"
                );
                parsed.extend(from_source);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => parsed.warnings.push(RuleError::Source {
                path,
                reason: e.to_string(),
            }),
        }
    }

    parsed
}

/// Parse the line-oriented redirects format.
pub fn parse_redirects_file(source: &Path, content: &str) -> Parsed {
    let mut parsed = Parsed::default();

    for (i, line) in content.lines().enumerate() {
        let origin = RuleOrigin::new(source, i + 1);
        let tokens: Vec<&str> = line
            .split_whitespace()
            .take_while(|t| !t.starts_with('#'))
            .collect();
        if tokens.is_empty() {
            continue;
        }
        match parse_line(&tokens, origin.clone()) {
            Ok(rule) => parsed.rules.push(rule),
            Err(reason) => parsed.warnings.push(RuleError::Malformed { origin, reason }),
        }
    }

    parsed
}

fn parse_line(tokens: &[&str], origin: RuleOrigin) -> Result<RawRule, String> {
    let mut rule = RawRule {
        from: tokens[0].to_string(),
        origin,
        ..Default::default()
    };

    let mut rest = tokens[1..].iter().copied().peekable();
    while let Some(&token) = rest.peek() {
        if token.starts_with('/') || is_absolute_url(token) {
            break;
        }
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("expected a destination, found '{}'", token))?;
        rule.query.insert(key.to_string(), value.to_string());
        rest.next();
    }

    rule.to = rest
        .next()
        .ok_or_else(|| "missing destination".to_string())?
        .to_string();

    if let Some(&token) = rest.peek() {
        if !token.contains('=') {
            let (code, force) = match token.strip_suffix('!') {
                Some(code) => (code, true),
                None => (token, false),
            };
            let status = code
                .parse::<u16>()
                .map_err(|_| format!("invalid status '{}'", token))?;
            rule.status = Some(status);
            rule.force = force;
            rest.next();
        }
    }

    for token in rest {
        let (key, values) = token
            .split_once('=')
            .ok_or_else(|| format!("unexpected token '{}'", token))?;
        apply_condition(&mut rule.conditions, key, values)?;
    }

    Ok(rule)
}

fn apply_condition(conditions: &mut RawConditions, key: &str, values: &str) -> Result<(), String> {
    let list = || -> Vec<String> {
        values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    };
    match key.to_ascii_lowercase().as_str() {
        "country" => conditions.country.extend(list()),
        "language" => conditions.language.extend(list()),
        "role" => conditions.role.extend(list()),
        "cookie" => conditions.cookie.extend(list()),
        "host" => conditions.host = Some(values.to_string()),
        "scheme" => conditions.scheme = Some(values.to_string()),
        _ => return Err(format!("unknown condition '{}'", key)),
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SiteConfig {
    #[serde(default)]
    redirects: Vec<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RedirectEntry {
    from: String,
    to: String,
    status: Option<u16>,
    #[serde(default)]
    force: bool,
    #[serde(default, alias = "negate")]
    negative: bool,
    #[serde(default)]
    query: BTreeMap<String, String>,
    #[serde(default)]
    conditions: RawConditions,
}

/// Parse the `[[redirects]]` entries of a TOML site config.
pub fn parse_site_config(source: &Path, content: &str) -> Parsed {
    let mut parsed = Parsed::default();

    let config: SiteConfig = match toml::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            parsed.warnings.push(RuleError::Source {
                path: source.to_path_buf(),
                reason: e.to_string(),
            });
            return parsed;
        }
    };

    for (i, value) in config.redirects.into_iter().enumerate() {
        let origin = RuleOrigin::new(source, i + 1);
        match value.try_into::<RedirectEntry>() {
            Ok(entry) => parsed.rules.push(RawRule {
                from: entry.from,
                to: entry.to,
                status: entry.status,
                force: entry.force,
                negative: entry.negative,
                query: entry.query,
                conditions: entry.conditions,
                origin,
            }),
            Err(e) => parsed.warnings.push(RuleError::Malformed {
                origin,
                reason: e.to_string(),
            }),
        }
    }

    parsed
}
