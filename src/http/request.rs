//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Echo the ID on the response
//! - Attach the ID to the request's tracing span
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Upstream requests carry the same `x-request-id` header

use axum::http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning `x-request-id` to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// The request's ID, if one has been assigned.
pub fn request_id<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for one request, tagged with its ID.
pub fn make_span<B>(req: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(req),
        method = %req.method(),
        uri = %req.uri(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_generated_and_echoed() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "abc-123");
    }
}
