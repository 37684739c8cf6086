//! `from` path patterns.
//!
//! A pattern is a `/`-rooted list of segments:
//! - `literal` matches exactly (case-sensitive)
//! - `:name` matches one non-empty segment and captures it
//! - `*` matches the rest of the path, possibly empty, and captures it as `splat`
//!
//! A trailing slash is not significant on either side.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Capture name bound to the splat remainder.
pub const SPLAT: &str = "splat";

/// Syntax problem in a pattern or target template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SyntaxError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Splat,
}

/// Values captured while matching a rule, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<(String, String)>);

impl Captures {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Capture by 1-based position.
    pub fn nth(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.iter().cloned().collect()
    }
}

/// Compiled `from` path matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, SyntaxError> {
        if !pattern.starts_with('/') {
            return Err(SyntaxError("path must start with '/'".into()));
        }
        if pattern.contains('?') {
            return Err(SyntaxError(
                "query strings are matched with query parameters, not in the path".into(),
            ));
        }

        let trimmed = trim_slashes(pattern);
        let raw: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut segments = Vec::with_capacity(raw.len());
        for (i, part) in raw.iter().enumerate() {
            let segment = if *part == "*" {
                if i + 1 != raw.len() {
                    return Err(SyntaxError("splat '*' must be the last segment".into()));
                }
                Segment::Splat
            } else if let Some(name) = part.strip_prefix(':') {
                if !is_identifier(name) {
                    return Err(SyntaxError(format!("invalid parameter name ':{}'", name)));
                }
                if name == SPLAT {
                    return Err(SyntaxError("':splat' is reserved for '*'".into()));
                }
                if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                    return Err(SyntaxError(format!("duplicate parameter ':{}'", name)));
                }
                Segment::Param(name.to_string())
            } else if part.contains('*') {
                return Err(SyntaxError("splat '*' must be a whole segment".into()));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names this pattern captures, in declaration order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Splat => Some(SPLAT),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning the captures on success.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let trimmed = trim_slashes(path);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut captures = Captures::default();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i).filter(|p| !p.is_empty())?;
                    captures.push(name.as_str(), *value);
                }
                Segment::Splat => {
                    let rest = parts.get(i..).unwrap_or_default();
                    captures.push(SPLAT, rest.join("/"));
                    return Some(captures);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => write!(f, "/{}", l)?,
                Segment::Param(n) => write!(f, "/:{}", n)?,
                Segment::Splat => write!(f, "/*")?,
            }
        }
        Ok(())
    }
}

/// Required query parameters. A `:name` value captures whatever the request sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPattern {
    params: Vec<(String, QueryValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryValue {
    Capture(String),
    Literal(String),
}

impl QueryPattern {
    pub fn parse(params: &BTreeMap<String, String>) -> Result<Self, SyntaxError> {
        let mut parsed = Vec::with_capacity(params.len());
        for (key, value) in params {
            if key.is_empty() {
                return Err(SyntaxError("empty query parameter name".into()));
            }
            let value = match value.strip_prefix(':') {
                Some(name) if is_identifier(name) => QueryValue::Capture(name.to_string()),
                Some(name) => {
                    return Err(SyntaxError(format!("invalid query capture ':{}'", name)))
                }
                None => QueryValue::Literal(value.clone()),
            };
            parsed.push((key.clone(), value));
        }
        Ok(Self { params: parsed })
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(|(_, v)| match v {
            QueryValue::Capture(name) => Some(name.as_str()),
            QueryValue::Literal(_) => None,
        })
    }

    /// Check the request query, appending captures on success.
    pub fn matches(&self, query: &[(String, String)], captures: &mut Captures) -> bool {
        for (key, expected) in &self.params {
            let Some((_, actual)) = query.iter().find(|(k, _)| k == key) else {
                return false;
            };
            match expected {
                QueryValue::Capture(name) => captures.push(name.as_str(), actual.as_str()),
                QueryValue::Literal(literal) => {
                    if literal != actual {
                        return false;
                    }
                }
            }
        }
        true
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn trim_slashes(path: &str) -> &str {
    path.trim_start_matches('/').trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match_is_exact() {
        let pattern = PathPattern::parse("/blog/posts").unwrap();
        assert!(pattern.matches("/blog/posts").is_some());
        assert!(pattern.matches("/blog/posts/").is_some());
        assert!(pattern.matches("/Blog/posts").is_none());
        assert!(pattern.matches("/blog").is_none());
        assert!(pattern.matches("/blog/posts/extra").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/index.html").is_none());
    }

    #[test]
    fn test_named_params_take_one_segment() {
        let pattern = PathPattern::parse("/users/:id/posts/:post").unwrap();
        let captures = pattern.matches("/users/42/posts/hello").unwrap();
        assert_eq!(captures.get("id"), Some("42"));
        assert_eq!(captures.get("post"), Some("hello"));
        assert_eq!(captures.nth(2), Some("hello"));

        assert!(pattern.matches("/users/42/posts").is_none());
        assert!(pattern.matches("/users/42/posts/a/b").is_none());
    }

    #[test]
    fn test_splat_captures_slashes() {
        let pattern = PathPattern::parse("/old/*").unwrap();
        let captures = pattern.matches("/old/a/b/c").unwrap();
        assert_eq!(captures.get(SPLAT), Some("a/b/c"));

        let empty = pattern.matches("/old").unwrap();
        assert_eq!(empty.get(SPLAT), Some(""));

        assert!(pattern.matches("/older/a").is_none());
    }

    #[test]
    fn test_root_splat_matches_everything() {
        let pattern = PathPattern::parse("/*").unwrap();
        assert_eq!(pattern.matches("/").unwrap().get(SPLAT), Some(""));
        assert_eq!(pattern.matches("/x/y").unwrap().get(SPLAT), Some("x/y"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("no-slash").is_err());
        assert!(PathPattern::parse("/a/*/b").is_err());
        assert!(PathPattern::parse("/a*").is_err());
        assert!(PathPattern::parse("/:id/:id").is_err());
        assert!(PathPattern::parse("/:splat").is_err());
        assert!(PathPattern::parse("/search?q=1").is_err());
    }

    #[test]
    fn test_display_roundtrips_shape() {
        let pattern = PathPattern::parse("/a/:b/*").unwrap();
        assert_eq!(pattern.to_string(), "/a/:b/*");
        assert_eq!(pattern.capture_names().collect::<Vec<_>>(), vec!["b", "splat"]);
    }

    #[test]
    fn test_query_pattern() {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), ":id".to_string());
        params.insert("lang".to_string(), "en".to_string());
        let pattern = QueryPattern::parse(&params).unwrap();

        let query = vec![
            ("id".to_string(), "7".to_string()),
            ("lang".to_string(), "en".to_string()),
        ];
        let mut captures = Captures::default();
        assert!(pattern.matches(&query, &mut captures));
        assert_eq!(captures.get("id"), Some("7"));

        let wrong = vec![
            ("id".to_string(), "7".to_string()),
            ("lang".to_string(), "fr".to_string()),
        ];
        assert!(!pattern.matches(&wrong, &mut Captures::default()));
        assert!(!pattern.matches(&[], &mut Captures::default()));
    }
}
