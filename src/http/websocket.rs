//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests
//! - Dial the backend with the client's handshake headers
//! - Complete the client handshake, echoing the backend's chosen sub-protocol
//! - Hand both sockets to the relay
//!
//! # Data Flow
//! ```text
//! Client ──upgrade──→ Proxy ──dial──→ Backend
//!                       │  (101 from backend)
//! Client ←───101─────── Proxy
//! Client ←── frames ──→ relay ←── frames ──→ Backend
//! ```
//!
//! # Design Decisions
//! - The backend is dialed before the client is upgraded, so a dead backend
//!   is reported as a failed handshake rather than an immediately closed socket
//! - Credentials never travel in the dial URL; they become `Authorization: Basic`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{self, client::IntoClientRequest},
    Connector,
};

use crate::http::relay::{self, BackendSocket};
use crate::http::request::{forwarded_for_chain, request_id, InboundRequestContext, X_FORWARDED_FOR};
use crate::http::response::{self, is_hop_by_hop};
use crate::http::server::AppState;
use crate::routing::{rewrite, OutboundTarget, Protocol, RewriteError, Target};

/// Handshake headers the dialer generates itself.
const HANDSHAKE_HEADERS: [HeaderName; 7] = [
    header::HOST,
    header::ORIGIN,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_ACCEPT,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::SEC_WEBSOCKET_PROTOCOL,
];

/// Why the backend side of a WebSocket could not be opened.
#[derive(Debug, Error)]
pub enum DialError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("cannot build backend handshake for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("backend handshake with {url} failed: {source}")]
    Handshake {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
}

/// An open backend socket and the sub-protocol the backend accepted.
pub struct BackendConnection {
    pub socket: BackendSocket,
    pub protocol: Option<String>,
    pub target: OutboundTarget,
}

/// True when `Connection` lists `upgrade` and `Upgrade` is `websocket`.
///
/// Both comparisons ignore ASCII case; `Connection` may span several lines.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));

    connection_upgrade && upgrade_websocket
}

/// Build the backend handshake request for an inbound upgrade.
pub fn dial_request(
    parts: &Parts,
    outbound: &OutboundTarget,
    inbound: &InboundRequestContext,
    client_addr: SocketAddr,
) -> Result<tungstenite::handshake::client::Request, DialError> {
    let url = outbound.wire_url();
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|source| DialError::Request {
            url: url.to_string(),
            source,
        })?;

    let headers = request.headers_mut();
    for (name, value) in parts.headers.iter() {
        if is_hop_by_hop(name) || HANDSHAKE_HEADERS.contains(name) || *name == X_FORWARDED_FOR {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(origin) = &inbound.origin {
        headers.insert(header::ORIGIN, origin.clone());
    }
    if !inbound.subprotocols.is_empty() {
        if let Ok(offered) = HeaderValue::from_str(&inbound.subprotocols.join(", ")) {
            headers.insert(header::SEC_WEBSOCKET_PROTOCOL, offered);
        }
    }
    if let Ok(chain) = HeaderValue::from_str(&forwarded_for_chain(&parts.headers, client_addr.ip())) {
        headers.insert(X_FORWARDED_FOR, chain);
    }
    if !headers.contains_key(header::AUTHORIZATION) {
        if let Some(credentials) = outbound.basic_authorization() {
            headers.insert(header::AUTHORIZATION, credentials);
        }
    }

    Ok(request)
}

/// Open the backend socket for an inbound upgrade.
pub async fn dial(
    parts: &Parts,
    target: &Target,
    client_addr: SocketAddr,
    tls: Arc<rustls::ClientConfig>,
) -> Result<BackendConnection, DialError> {
    let inbound = InboundRequestContext::from_parts(parts, Protocol::WebSocket);
    let outbound = rewrite(target, &inbound)?;
    let request = dial_request(parts, &outbound, &inbound, client_addr)?;

    tracing::debug!(upstream = %outbound.wire_url(), "Dialing backend WebSocket");

    let (socket, handshake) =
        connect_async_tls_with_config(request, None, false, Some(Connector::Rustls(tls)))
            .await
            .map_err(|source| DialError::Handshake {
                url: outbound.wire_url().to_string(),
                source,
            })?;

    let protocol = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(BackendConnection {
        socket,
        protocol,
        target: outbound,
    })
}

/// Proxy one upgrade request to `target`.
///
/// A failed dial answers the client with an empty 502 and no upgrade.
pub async fn proxy(
    state: &AppState,
    request: Request<Body>,
    target: &Target,
    client_addr: SocketAddr,
) -> Response {
    let request_id = request_id(request.headers()).to_string();
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, error = %rejection, "Malformed upgrade request");
            return rejection.into_response();
        }
    };

    let backend = match dial(&parts, target, client_addr, Arc::clone(&state.tls)).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Backend WebSocket dial failed");
            return response::empty(StatusCode::BAD_GATEWAY);
        }
    };

    let session = state.sessions.track();
    tracing::info!(
        request_id = %request_id,
        session_id = %session.id(),
        upstream = %backend.target.wire_url(),
        protocol = ?backend.protocol,
        "WebSocket upgraded"
    );

    let upgrade = match backend.protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };
    let socket = backend.socket;

    upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(request_id = %request_id, error = %e, "Client upgrade failed");
        })
        .on_upgrade(move |client| relay::relay(client, socket, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rewrite;

    fn upgrade_parts(extra: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder()
            .uri("/chat?room=1")
            .header("Host", "chat.example.com")
            .header("Connection", "keep-alive, Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("Sec-WebSocket-Version", "13");
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    fn dial_for(target: &str, parts: &Parts) -> tungstenite::handshake::client::Request {
        let target: Target = target.parse().unwrap();
        let inbound = InboundRequestContext::from_parts(parts, Protocol::WebSocket);
        let outbound = rewrite(&target, &inbound).unwrap();
        dial_request(parts, &outbound, &inbound, "198.51.100.7:5000".parse().unwrap()).unwrap()
    }

    #[test]
    fn detects_upgrade_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, UPGRADE"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_upgrade_request(&headers));
    }

    #[test]
    fn connection_token_may_be_on_a_later_line() {
        let mut headers = HeaderMap::new();
        headers.append(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.append(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));
    }

    #[test]
    fn plain_requests_are_not_upgrades() {
        let mut headers = HeaderMap::new();
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_upgrade_request(&headers));
    }

    #[test]
    fn dial_targets_rewritten_url() {
        let parts = upgrade_parts(&[]);
        let request = dial_for("ws://127.0.0.1:9000/socket", &parts);
        assert_eq!(request.uri().to_string(), "ws://127.0.0.1:9000/socket/chat?room=1");
    }

    #[test]
    fn dial_regenerates_handshake_headers() {
        let parts = upgrade_parts(&[("Cookie", "session=abc"), ("X-Forwarded-For", "10.0.0.1")]);
        let request = dial_for("ws://127.0.0.1:9000", &parts);
        let headers = request.headers();

        assert_ne!(headers.get(header::SEC_WEBSOCKET_KEY).unwrap(), "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(headers.get(header::HOST).unwrap(), "127.0.0.1:9000");
        assert_eq!(headers.get(header::COOKIE).unwrap(), "session=abc");
        assert_eq!(headers.get_all(header::SEC_WEBSOCKET_KEY).iter().count(), 1);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "10.0.0.1, 198.51.100.7");
    }

    #[test]
    fn dial_carries_origin_and_subprotocols() {
        let parts = upgrade_parts(&[
            ("Origin", "https://chat.example.com"),
            ("Sec-WebSocket-Protocol", "v2.chat, v1.chat"),
        ]);
        let request = dial_for("ws://127.0.0.1:9000", &parts);
        let headers = request.headers();

        assert_eq!(headers.get(header::ORIGIN).unwrap(), "https://chat.example.com");
        assert_eq!(headers.get(header::SEC_WEBSOCKET_PROTOCOL).unwrap(), "v2.chat, v1.chat");
    }

    #[test]
    fn userinfo_becomes_basic_auth() {
        let parts = Request::builder()
            .uri("ws://alice:secret@chat.example.com/live")
            .header("Connection", "upgrade")
            .header("Upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0;
        let request = dial_for("ws://127.0.0.1:9000", &parts);

        assert_eq!(request.uri().to_string(), "ws://127.0.0.1:9000/live");
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).unwrap(),
            "Basic YWxpY2U6c2VjcmV0"
        );
    }
}
