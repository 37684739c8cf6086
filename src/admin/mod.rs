//! Admin (rule introspection) router.
//!
//! # Endpoints
//! - `GET /admin/status`: version, uptime and rule count
//! - `GET /admin/rules`: the active compiled rules in order
//! - `GET /admin/match?path=..`: the decision for a synthetic request

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/rules", get(get_rules))
        .route("/admin/match", get(get_match))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
