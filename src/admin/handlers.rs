use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::routing::{Decision, RequestContext};
use crate::rules::RuleSummary;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub rules: usize,
    pub framework_url: Option<String>,
    pub dist_dir: String,
}

/// Synthetic request for `/admin/match`.
#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub path: String,
    pub query: Option<String>,
    pub host: Option<String>,
    pub scheme: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    /// Comma-separated role names.
    pub roles: Option<String>,
    /// Comma-separated cookie names.
    pub cookies: Option<String>,
}

impl MatchQuery {
    fn into_context(self, default_country: Option<&str>) -> RequestContext {
        let mut ctx = RequestContext::new(self.path);
        if let Some(query) = &self.query {
            ctx = ctx.with_query(query);
        }
        if let Some(host) = &self.host {
            ctx = ctx.with_host(host);
        }
        if let Some(scheme) = &self.scheme {
            ctx = ctx.with_scheme(scheme);
        }
        if let Some(country) = self.country.as_deref().or(default_country) {
            ctx = ctx.with_country(country);
        }
        if let Some(language) = &self.language {
            ctx = ctx.with_language(language);
        }
        for role in split_list(self.roles.as_deref()) {
            ctx = ctx.with_role(role);
        }
        for cookie in split_list(self.cookies.as_deref()) {
            ctx = ctx.with_cookie(cookie, "");
        }
        ctx
    }
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let project = &state.config.project;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        rules: state.store().current().len(),
        framework_url: project.framework_url.clone(),
        dist_dir: project.dist_dir().display().to_string(),
    })
}

pub async fn get_rules(State(state): State<AppState>) -> Json<Vec<RuleSummary>> {
    Json(state.store().current().summaries())
}

pub async fn get_match(
    State(state): State<AppState>,
    Query(params): Query<MatchQuery>,
) -> Json<Decision> {
    let ctx = params.into_context(state.config.geo.country.as_deref());
    Json(state.store().current().decide(&ctx))
}

#[cfg(test)]
mod tests {
    use crate::admin::setup_admin_router;
    use crate::config::schema::{ProjectConfig, ProxyConfig};
    use crate::http::HttpServer;
    use crate::rules::{compile_rules, RawRule, RuleSet, RuleStore};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn admin(api_key: Option<&str>) -> Router {
        let mut config = ProxyConfig::default();
        config.admin.api_key = api_key.map(str::to_string);
        let rules = vec![
            RawRule::new("/something", "/ping").with_status(200),
            RawRule::new("/old/*", "/new/:splat").with_status(301),
        ];
        let (compiled, _) = compile_rules(&rules, true).unwrap();
        let store = RuleStore::with_rules(ProjectConfig::default(), RuleSet::new(compiled));
        let server = HttpServer::new(config, Arc::new(store)).unwrap();
        setup_admin_router(server.state().clone())
    }

    async fn json(router: Router, uri: &str) -> serde_json::Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_match_endpoint() {
        let decision = json(admin(None), "/admin/match?path=/something").await;
        assert_eq!(decision["from"], "/something");
        assert_eq!(decision["to"], "/ping");
        assert_eq!(decision["status"], 200);
        assert_eq!(decision["force"], false);
        assert_eq!(decision["negative"], false);
        assert_eq!(decision["host"], "");
        assert_eq!(decision["scheme"], "");

        let pass = json(admin(None), "/admin/match?path=/unmapped").await;
        assert_eq!(pass["kind"], "pass");
    }

    #[tokio::test]
    async fn test_rules_and_status() {
        let rules = json(admin(None), "/admin/rules").await;
        assert_eq!(rules.as_array().unwrap().len(), 2);
        assert_eq!(rules[1]["kind"]["type"], "redirect");

        let status = json(admin(None), "/admin/status").await;
        assert_eq!(status["rules"], 2);
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let router = admin(Some("secret"));
        let denied = router
            .clone()
            .oneshot(Request::builder().uri("/admin/rules").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = router
            .oneshot(
                Request::builder()
                    .uri("/admin/rules")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
