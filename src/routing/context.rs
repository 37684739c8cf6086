//! Request attributes the rule matcher looks at.
//!
//! Extraction happens once per request; matching afterwards is a pure
//! function of this struct and the rule set.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Cookie carrying the identity JWT whose `app_metadata.roles` feed `role` conditions.
pub const ROLE_COOKIE: &str = "nf_jwt";

/// Header overriding the configured geolocation country.
pub const COUNTRY_HEADER: &str = "x-country";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    /// Raw query string without the leading `?`.
    pub raw_query: Option<String>,
    pub query: Vec<(String, String)>,
    /// Lower-cased host without port.
    pub host: String,
    pub scheme: String,
    pub country: Option<String>,
    /// Lower-cased language tags from `Accept-Language`, with primary subtags.
    pub languages: Vec<String>,
    pub roles: Vec<String>,
    pub cookies: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            raw_query: None,
            query: Vec::new(),
            host: String::new(),
            scheme: "http".to_string(),
            country: None,
            languages: Vec::new(),
            roles: Vec::new(),
            cookies: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = parse_query(raw);
        self.raw_query = (!raw.is_empty()).then(|| raw.to_string());
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = normalize_host(host);
        self
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_ascii_lowercase();
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_ascii_lowercase());
        self
    }

    pub fn with_language(mut self, accept_language: &str) -> Self {
        self.languages = parse_languages(accept_language);
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    /// Extract the matching context from an incoming request.
    pub fn from_request<B>(req: &Request<B>, default_country: Option<&str>) -> Self {
        let headers = req.headers();
        let uri = req.uri();

        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .map(normalize_host)
            .unwrap_or_default();

        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.scheme_str())
            .unwrap_or("http")
            .to_ascii_lowercase();

        let country = headers
            .get(COUNTRY_HEADER)
            .and_then(|h| h.to_str().ok())
            .or(default_country)
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty());

        let languages = headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|h| h.to_str().ok())
            .map(parse_languages)
            .unwrap_or_default();

        let cookies: Vec<(String, String)> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(parse_cookies)
            .collect();

        let roles = cookies
            .iter()
            .find(|(name, _)| name == ROLE_COOKIE)
            .map(|(_, token)| roles_from_jwt(token))
            .unwrap_or_default();

        let raw_query = uri.query().filter(|q| !q.is_empty()).map(str::to_string);
        let query = raw_query.as_deref().map(parse_query).unwrap_or_default();

        Self {
            path: uri.path().to_string(),
            raw_query,
            query,
            host,
            scheme,
            country,
            languages,
            roles,
            cookies,
            headers: headers.clone(),
        }
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.iter().any(|(n, _)| n == name)
    }

    /// Path plus query as received.
    pub fn path_and_query(&self) -> String {
        match &self.raw_query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        host.find(']').map(|i| &host[..=i]).unwrap_or(host)
    } else {
        host.split(':').next().unwrap_or(host)
    };
    without_port.to_ascii_lowercase()
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

fn parse_languages(accept_language: &str) -> Vec<String> {
    let mut languages = Vec::new();
    for entry in accept_language.split(',') {
        let tag = entry.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if tag.is_empty() || tag == "*" {
            continue;
        }
        if let Some((primary, _)) = tag.split_once('-') {
            if !languages.iter().any(|l| l == primary) {
                languages.push(primary.to_string());
            }
        }
        if !languages.contains(&tag) {
            languages.push(tag);
        }
    }
    languages
}

fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Read `app_metadata.roles` from a JWT payload. The signature is not checked.
fn roles_from_jwt(token: &str) -> Vec<String> {
    let Some(payload) = token.split('.').nth(1) else {
        return Vec::new();
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return Vec::new();
    };
    let Ok(claims) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Vec::new();
    };
    claims
        .pointer("/app_metadata/roles")
        .and_then(|r| r.as_array())
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
