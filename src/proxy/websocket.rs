//! WebSocket pass-through to the framework dev server.
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded TCP bytes ────→ Proxy ←──── upgraded TCP bytes ────→ Dev server
//! ```
//!
//! # Design Decisions
//! - The handshake is forwarded like any other request
//! - After `101 Switching Protocols` both sides are spliced byte for byte;
//!   frames are never parsed

use axum::http::{header, HeaderMap};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

/// Whether the request asks for a protocol upgrade.
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Splice both upgraded connections until either side closes.
pub async fn tunnel(client: OnUpgrade, upstream: OnUpgrade) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_upstream, to_client)) => {
            tracing::debug!(to_upstream, to_client, "WebSocket tunnel closed")
        }
        Err(e) => tracing::debug!(error = %e, "WebSocket tunnel ended with error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_upgrade() {
        let mut headers = HeaderMap::new();
        assert!(!is_upgrade(&headers));

        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(!is_upgrade(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade(&headers));
    }
}
