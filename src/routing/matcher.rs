//! Condition matching.
//!
//! # Responsibilities
//! - Match host and scheme (case-insensitive)
//! - Match country and language against the request's inferred values
//! - Match role claims, cookie presence and header values (case-preserving)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Empty condition set = always matches
//! - Negation is applied by the caller on the combined result
//! - No regex to guarantee O(n) matching

use axum::http::HeaderName;

use crate::routing::context::RequestContext;
use crate::rules::RawConditions;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestContext) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        req.host == self.expected_host
    }
}

/// Matches the request scheme (`http` / `https`).
#[derive(Debug, Clone)]
pub struct SchemeMatcher {
    expected_scheme: String,
}

impl SchemeMatcher {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            expected_scheme: scheme.into().to_lowercase(),
        }
    }
}

impl Matcher for SchemeMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        req.scheme == self.expected_scheme
    }
}

/// Matches when the request country is one of the listed codes.
#[derive(Debug, Clone)]
pub struct CountryMatcher {
    countries: Vec<String>,
}

impl CountryMatcher {
    pub fn new(countries: &[String]) -> Self {
        Self {
            countries: countries.iter().map(|c| c.to_lowercase()).collect(),
        }
    }
}

impl Matcher for CountryMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        req.country
            .as_ref()
            .map(|c| self.countries.contains(c))
            .unwrap_or(false)
    }
}

/// Matches when any accepted language is listed.
#[derive(Debug, Clone)]
pub struct LanguageMatcher {
    languages: Vec<String>,
}

impl LanguageMatcher {
    pub fn new(languages: &[String]) -> Self {
        Self {
            languages: languages.iter().map(|l| l.to_lowercase()).collect(),
        }
    }
}

impl Matcher for LanguageMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        req.languages.iter().any(|l| self.languages.contains(l))
    }
}

/// Matches when the identity token carries any listed role.
#[derive(Debug, Clone)]
pub struct RoleMatcher {
    roles: Vec<String>,
}

impl RoleMatcher {
    pub fn new(roles: &[String]) -> Self {
        Self {
            roles: roles.to_vec(),
        }
    }
}

impl Matcher for RoleMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        req.roles.iter().any(|r| self.roles.contains(r))
    }
}

/// Matches when any listed cookie is present.
#[derive(Debug, Clone)]
pub struct CookieMatcher {
    names: Vec<String>,
}

impl CookieMatcher {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names.to_vec(),
        }
    }
}

impl Matcher for CookieMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        self.names.iter().any(|n| req.has_cookie(n))
    }
}

/// Matches a header value exactly, or its presence when no value is given.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn new(name: &str, value: &str) -> Result<Self, String> {
        let name = HeaderName::try_from(name)
            .map_err(|_| format!("invalid header name '{}'", name))?;
        Ok(Self {
            name,
            value: (!value.is_empty()).then(|| value.to_string()),
        })
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        let mut values = req.headers.get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.to_str().map(|v| v == expected).unwrap_or(false)),
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Build the matcher for a rule's declared conditions.
    pub fn from_conditions(conditions: &RawConditions) -> Result<Self, String> {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();

        if let Some(host) = &conditions.host {
            matchers.push(Box::new(HostMatcher::new(host.as_str())));
        }
        if let Some(scheme) = &conditions.scheme {
            matchers.push(Box::new(SchemeMatcher::new(scheme.as_str())));
        }
        if !conditions.country.is_empty() {
            matchers.push(Box::new(CountryMatcher::new(&conditions.country)));
        }
        if !conditions.language.is_empty() {
            matchers.push(Box::new(LanguageMatcher::new(&conditions.language)));
        }
        if !conditions.role.is_empty() {
            matchers.push(Box::new(RoleMatcher::new(&conditions.role)));
        }
        if !conditions.cookie.is_empty() {
            matchers.push(Box::new(CookieMatcher::new(&conditions.cookie)));
        }
        for (name, value) in &conditions.headers {
            matchers.push(Box::new(HeaderMatcher::new(name, value)?));
        }

        Ok(Self::new(matchers))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestContext) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");

        assert!(matcher.matches(&RequestContext::new("/").with_host("example.com")));
        assert!(matcher.matches(&RequestContext::new("/").with_host("EXAMPLE.COM:8888"))); // Case insensitive
        assert!(!matcher.matches(&RequestContext::new("/").with_host("other.com")));
    }

    #[test]
    fn test_country_and_language() {
        let country = CountryMatcher::new(&["US".to_string(), "ca".to_string()]);
        assert!(country.matches(&RequestContext::new("/").with_country("us")));
        assert!(!country.matches(&RequestContext::new("/").with_country("de")));
        assert!(!country.matches(&RequestContext::new("/")));

        let language = LanguageMatcher::new(&["en".to_string()]);
        assert!(language.matches(&RequestContext::new("/").with_language("en-GB,fr;q=0.5")));
        assert!(!language.matches(&RequestContext::new("/").with_language("fr")));
    }

    #[test]
    fn test_role_is_case_sensitive() {
        let matcher = RoleMatcher::new(&["Admin".to_string()]);
        assert!(matcher.matches(&RequestContext::new("/").with_role("Admin")));
        assert!(!matcher.matches(&RequestContext::new("/").with_role("admin")));
    }

    #[test]
    fn test_header_value_and_presence() {
        let exact = HeaderMatcher::new("x-beta", "on").unwrap();
        let present = HeaderMatcher::new("x-beta", "").unwrap();

        let on = RequestContext::new("/").with_header("x-beta", "on");
        let off = RequestContext::new("/").with_header("x-beta", "off");
        assert!(exact.matches(&on));
        assert!(!exact.matches(&off));
        assert!(present.matches(&off));
        assert!(!present.matches(&RequestContext::new("/")));

        assert!(HeaderMatcher::new("bad header", "").is_err());
    }

    #[test]
    fn test_and_matcher() {
        let conditions = RawConditions {
            host: Some("Example.com".into()),
            cookie: vec!["session".into()],
            ..Default::default()
        };
        let matcher = AndMatcher::from_conditions(&conditions).unwrap();

        let both = RequestContext::new("/")
            .with_host("example.com")
            .with_cookie("session", "1");
        let host_only = RequestContext::new("/").with_host("example.com");
        assert!(matcher.matches(&both));
        assert!(!matcher.matches(&host_only));

        let empty = AndMatcher::from_conditions(&RawConditions::default()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.matches(&RequestContext::new("/anything")));
    }
}
