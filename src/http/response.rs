//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build redirect and error responses
//! - Strip hop-by-hop headers from upstream responses
//! - Rewrite upstream `Location` headers to the local origin
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Upstream timeouts result in 504 Gateway Timeout, failures in 502

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};

/// Connection-scoped headers that must not be forwarded.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    (status, message.to_string()).into_response()
}

/// Empty-bodied redirect to `location`.
pub fn redirect_response(status: u16, location: &str) -> Response<Body> {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::MOVED_PERMANENTLY);
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = status;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect target"),
    }
}

/// Replace the status of a response, keeping headers and body.
pub fn with_status(mut response: Response<Body>, status: u16) -> Response<Body> {
    if let Ok(status) = StatusCode::from_u16(status) {
        *response.status_mut() = status;
    }
    response
}

/// Point a `Location` on `upstream_origin` back at `local_origin`.
///
/// Origins are `scheme://authority` without a trailing slash.
pub fn rewrite_location(headers: &mut HeaderMap, upstream_origin: &str, local_origin: &str) {
    let Some(location) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let Some(rest) = strip_prefix_ignore_case(location, upstream_origin) else {
        return;
    };
    if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
        return;
    }

    let rewritten = format!("{}{}", local_origin, rest);
    if let Ok(value) = HeaderValue::from_str(&rewritten) {
        headers.insert(header::LOCATION, value);
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-custom"));
        headers.insert("x-custom", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);
        assert!(headers.get("x-custom").is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
    }

    #[test]
    fn test_redirect_response() {
        let response = redirect_response(302, "/new/a/b/c");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/new/a/b/c");
    }

    #[test]
    fn test_rewrite_location() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://API.example.com/v2/x?y=1"));
        rewrite_location(&mut headers, "https://api.example.com", "http://localhost:8888");
        assert_eq!(headers.get(header::LOCATION).unwrap(), "http://localhost:8888/v2/x?y=1");
    }

    #[test]
    fn test_foreign_location_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("https://api.example.com.evil/x"));
        rewrite_location(&mut headers, "https://api.example.com", "http://localhost:8888");
        assert_eq!(headers.get(header::LOCATION).unwrap(), "https://api.example.com.evil/x");

        headers.insert(header::LOCATION, HeaderValue::from_static("/relative"));
        rewrite_location(&mut headers, "https://api.example.com", "http://localhost:8888");
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/relative");
    }

    #[test]
    fn test_with_status() {
        let response = with_status(error_response(StatusCode::OK, "body"), 410);
        assert_eq!(response.status(), StatusCode::GONE);
    }
}
