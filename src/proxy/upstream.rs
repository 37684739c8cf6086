//! Upstream clients.
//!
//! # Responsibilities
//! - Forward requests to the local framework dev server (hyper client)
//! - Forward requests to external origins over http or https (reqwest)
//! - Map transport failures to 502 and timeouts to 504
//!
//! # Design Decisions
//! - No retries; a dev server restart surfaces as a 502
//! - Response bodies are streamed, request bodies for origins are buffered
//!   up to the configured limit

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::TimeoutConfig;
use crate::http::response::{rewrite_location, strip_hop_by_hop};
use crate::proxy::websocket;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream target '{0}'")]
    InvalidTarget(String),

    #[error("upstream connection failed: {0}")]
    Connect(String),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("request body rejected: {0}")]
    Body(String),
}

impl UpstreamError {
    /// Status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UpstreamError::InvalidTarget(_) | UpstreamError::Connect(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// `X-Forwarded-*` headers describing the original request.
pub fn add_forwarded_headers(headers: &mut HeaderMap, client: Option<SocketAddr>, local_origin: &str) {
    if let Some(addr) = client {
        let forwarded_for = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert("x-forwarded-for", value);
        }
    }
    if let Some((scheme, host)) = local_origin.split_once("://") {
        if let Ok(value) = HeaderValue::from_str(scheme) {
            headers.insert("x-forwarded-proto", value);
        }
        if let Ok(value) = HeaderValue::from_str(host) {
            headers.insert("x-forwarded-host", value);
        }
    }
}

fn client_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client for the framework dev server.
#[derive(Clone)]
pub struct FrameworkClient {
    base: Uri,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl FrameworkClient {
    pub fn new(base_url: &str, timeouts: &TimeoutConfig) -> Result<Self, UpstreamError> {
        let base: Uri = base_url
            .trim_end_matches('/')
            .parse()
            .map_err(|_| UpstreamError::InvalidTarget(base_url.to_string()))?;
        if base.scheme_str() != Some("http") || base.authority().is_none() {
            return Err(UpstreamError::InvalidTarget(base_url.to_string()));
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base,
            client,
            timeout: Duration::from_secs(timeouts.upstream_secs),
        })
    }

    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Forward `req` to `path_and_query` on the dev server.
    ///
    /// WebSocket upgrades are tunnelled once the dev server accepts them.
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        path_and_query: &str,
        local_origin: &str,
    ) -> Result<Response<Body>, UpstreamError> {
        let uri = Uri::builder()
            .scheme("http")
            .authority(self.base.authority().map(|a| a.as_str()).unwrap_or_default())
            .path_and_query(path_and_query)
            .build()
            .map_err(|_| UpstreamError::InvalidTarget(path_and_query.to_string()))?;

        let client = client_addr(&req);
        let upgrade = websocket::is_upgrade(req.headers());
        let client_upgrade = upgrade.then(|| hyper::upgrade::on(&mut req));

        *req.uri_mut() = uri;
        let headers = req.headers_mut();
        if !upgrade {
            strip_hop_by_hop(headers);
        }
        add_forwarded_headers(headers, client, local_origin);

        let mut response = match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(UpstreamError::Connect(e.to_string())),
            Err(_) => return Err(UpstreamError::Timeout(self.timeout)),
        };

        if let Some(client_upgrade) = client_upgrade {
            if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                let upstream_upgrade = hyper::upgrade::on(&mut response);
                tokio::spawn(websocket::tunnel(client_upgrade, upstream_upgrade));
                let (parts, _) = response.into_parts();
                return Ok(Response::from_parts(parts, Body::empty()));
            }
        }

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Client for external origins named by proxy rules.
#[derive(Clone)]
pub struct OriginClient {
    client: reqwest::Client,
    timeout: Duration,
    max_body_size: usize,
}

impl OriginClient {
    pub fn new(timeouts: &TimeoutConfig, max_body_size: usize) -> Result<Self, UpstreamError> {
        let timeout = Duration::from_secs(timeouts.upstream_secs);
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            max_body_size,
        })
    }

    /// Relay `req` to the absolute `target` URL.
    pub async fn forward(
        &self,
        req: Request<Body>,
        target: &str,
        local_origin: &str,
    ) -> Result<Response<Body>, UpstreamError> {
        let url = url::Url::parse(target).map_err(|_| UpstreamError::InvalidTarget(target.to_string()))?;
        let upstream_origin = url.origin().ascii_serialization();
        let client = client_addr(&req);

        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        add_forwarded_headers(&mut headers, client, local_origin);

        tracing::debug!(target = %url, method = %parts.method, "Proxying to origin");

        let response = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout)
                } else {
                    UpstreamError::Connect(e.to_string())
                }
            })?;

        let mut builder = Response::builder().status(response.status());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(response.headers().clone());
            strip_hop_by_hop(headers);
            rewrite_location(headers, &upstream_origin, local_origin);
        }
        builder
            .body(Body::from_stream(response.bytes_stream()))
            .map_err(|e| UpstreamError::Connect(e.to_string()))
    }
}
