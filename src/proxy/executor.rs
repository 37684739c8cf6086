//! Decision execution.
//!
//! # Responsibilities
//! - Extract the request context and ask the active rule set for a decision
//! - Let existing static files shadow non-forced rules
//! - Carry out rewrite, redirect, proxy and error-page decisions
//! - Fall back to static files, then the framework dev server, then 404
//!
//! # Design Decisions
//! - Every outcome, including upstream failure, is an HTTP response
//! - One code path resolves local targets for pass-through, rewrites and
//!   error pages

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::ProxyConfig;
use crate::http::response::{error_response, redirect_response, with_status};
use crate::observability::metrics;
use crate::proxy::static_files::StaticFiles;
use crate::proxy::upstream::{FrameworkClient, OriginClient, UpstreamError};
use crate::routing::{Decision, DecisionKind, RequestContext};
use crate::rules::RuleStore;

pub struct Executor {
    store: Arc<RuleStore>,
    statics: StaticFiles,
    framework: Option<FrameworkClient>,
    origins: OriginClient,
    default_country: Option<String>,
}

impl Executor {
    pub fn new(config: &ProxyConfig, store: Arc<RuleStore>) -> Result<Self, UpstreamError> {
        let framework = config
            .project
            .framework_url
            .as_deref()
            .map(|url| FrameworkClient::new(url, &config.timeouts))
            .transpose()?;

        Ok(Self {
            store,
            statics: StaticFiles::new(config.project.dist_dir()),
            framework,
            origins: OriginClient::new(&config.timeouts, config.listener.max_body_size)?,
            default_country: config.geo.country.clone(),
        })
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Decide and execute one request.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let method = req.method().to_string();

        let ctx = RequestContext::from_request(&req, self.default_country.as_deref());
        let decision = self.store.current().decide(&ctx);

        tracing::debug!(
            path = %ctx.path,
            decision = ?decision.kind,
            to = %decision.to,
            rule = ?decision.rule,
            "Request matched"
        );

        let response = self.execute(&decision, &ctx, req).await;
        metrics::record_request(&method, response.status().as_u16(), kind_label(decision.kind), start);
        response
    }

    /// Produce the response for `decision`.
    pub async fn execute(&self, decision: &Decision, ctx: &RequestContext, req: Request<Body>) -> Response<Body> {
        if decision.shadowable && is_read(req.method()) {
            if let Some(file) = self.statics.locate(&ctx.path) {
                if let Some(response) = self.serve_file(&file, StatusCode::OK, req.method()).await {
                    tracing::debug!(path = %ctx.path, "Static file shadows rule");
                    return response;
                }
            }
        }

        let local_origin = local_origin(ctx, &req);

        match decision.kind {
            DecisionKind::Pass => self.resolve(req, &ctx.path_and_query(), None, &local_origin).await,
            DecisionKind::Rewrite => {
                let status = (decision.status != 200).then_some(decision.status);
                self.resolve(req, &decision.to, status, &local_origin).await
            }
            DecisionKind::Redirect => redirect_response(decision.status, &decision.to),
            DecisionKind::Proxy => match self.origins.forward(req, &decision.to, &local_origin).await {
                Ok(response) if decision.status != 200 => with_status(response, decision.status),
                Ok(response) => response,
                Err(e) => upstream_failure(&decision.to, e),
            },
            DecisionKind::Error => {
                let fallback = Request::builder()
                    .method(Method::GET)
                    .uri(decision.to.as_str())
                    .body(Body::empty());
                let mut fallback = match fallback {
                    Ok(fallback) => fallback,
                    Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid error page"),
                };
                *fallback.headers_mut() = req.headers().clone();
                fallback.headers_mut().remove(header::CONTENT_LENGTH);
                if let Some(connect_info) = req.extensions().get::<axum::extract::ConnectInfo<std::net::SocketAddr>>() {
                    fallback.extensions_mut().insert(*connect_info);
                }

                let response = self.resolve(req, &ctx.path_and_query(), None, &local_origin).await;
                if response.status() != StatusCode::NOT_FOUND {
                    return response;
                }
                self.resolve(fallback, &decision.to, Some(404), &local_origin).await
            }
        }
    }

    /// Serve a local `target` from static files, else the framework, else 404.
    async fn resolve(
        &self,
        req: Request<Body>,
        target: &str,
        status: Option<u16>,
        local_origin: &str,
    ) -> Response<Body> {
        let path = target.split(['?', '#']).next().unwrap_or(target);

        if is_read(req.method()) {
            if let Some(file) = self.statics.locate(path) {
                let status = status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::OK);
                if let Some(response) = self.serve_file(&file, status, req.method()).await {
                    return response;
                }
            }
        }

        let Some(framework) = &self.framework else {
            return error_response(StatusCode::NOT_FOUND, "Not Found");
        };

        match framework.forward(req, target, local_origin).await {
            Ok(response) => match status {
                Some(status) if response.status() != StatusCode::SWITCHING_PROTOCOLS => {
                    with_status(response, status)
                }
                _ => response,
            },
            Err(e) => upstream_failure(&framework.base().to_string(), e),
        }
    }

    /// `None` when the file vanished between lookup and read; callers treat
    /// that as no static file.
    async fn serve_file(&self, file: &std::path::Path, status: StatusCode, method: &Method) -> Option<Response<Body>> {
        match self.statics.serve(file, status, *method == Method::HEAD).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!(path = ?file, error = %e, "Static file unreadable");
                None
            }
        }
    }
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn kind_label(kind: DecisionKind) -> &'static str {
    match kind {
        DecisionKind::Pass => "pass",
        DecisionKind::Rewrite => "rewrite",
        DecisionKind::Redirect => "redirect",
        DecisionKind::Proxy => "proxy",
        DecisionKind::Error => "error",
    }
}

/// `scheme://host[:port]` the client used to reach us.
fn local_origin<B>(ctx: &RequestContext, req: &Request<B>) -> String {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(ctx.host.as_str());
    format!("{}://{}", ctx.scheme, host)
}

fn upstream_failure(target: &str, e: UpstreamError) -> Response<Body> {
    tracing::error!(upstream = %target, error = %e, "Upstream request failed");
    error_response(e.status(), &e.to_string())
}
