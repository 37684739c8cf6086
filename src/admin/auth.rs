use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Gate the admin routes behind `admin.api_key`, when one is set.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let required = state.config.admin.api_key.as_deref();

    match (required, bearer_token(request.headers())) {
        (None, _) => Ok(next.run(request).await),
        (Some(key), Some(token)) if token == key => Ok(next.run(request).await),
        (Some(_), _) => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request without valid api key");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
