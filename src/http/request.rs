//! Request inspection.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Extract the routing-relevant pieces of a request (host, path, query, userinfo)
//! - Build the forwarded-address chain for the next hop
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The original request is never mutated here; callers decide what to forward

use std::net::IpAddr;

use axum::http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::matcher::request_host_from;
use crate::routing::Protocol;

/// Request ID header name.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Forwarded-address chain header name.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Per-request data the rewriter and the WebSocket dialer need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequestContext {
    pub protocol: Protocol,
    pub method: Method,
    pub host: Option<String>,
    /// `user[:password]` from an absolute-form request URI.
    pub userinfo: Option<String>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
    pub origin: Option<HeaderValue>,
    /// Sub-protocols offered in `Sec-WebSocket-Protocol`, in order.
    pub subprotocols: Vec<String>,
}

impl InboundRequestContext {
    /// Capture the context of a request head.
    ///
    /// `http::Uri` discards fragments, so `fragment` is always `None` here.
    pub fn from_parts(parts: &Parts, protocol: Protocol) -> Self {
        let userinfo = parts
            .uri
            .authority()
            .and_then(|a| a.as_str().rsplit_once('@'))
            .map(|(userinfo, _)| userinfo.to_string());

        Self {
            protocol,
            method: parts.method.clone(),
            host: request_host_from(&parts.headers, &parts.uri).map(str::to_string),
            userinfo,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            fragment: None,
            origin: parts.headers.get(header::ORIGIN).cloned(),
            subprotocols: subprotocols(&parts.headers),
        }
    }

    /// Context from a raw origin-form request target (`/path?query#fragment`).
    pub fn from_request_target(protocol: Protocol, raw: &str) -> Self {
        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (raw, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };

        Self {
            protocol,
            method: Method::GET,
            host: None,
            userinfo: None,
            path: path.to_string(),
            query,
            fragment,
            origin: None,
            subprotocols: Vec::new(),
        }
    }
}

/// Split every `Sec-WebSocket-Protocol` header line into tokens.
fn subprotocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Append `client` to the inbound `X-Forwarded-For` chain.
///
/// All header lines are considered; empty entries are dropped.
pub fn forwarded_for_chain(headers: &HeaderMap, client: IpAddr) -> String {
    let mut chain: Vec<String> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .collect();
    chain.push(client.to_string());
    chain.join(", ")
}
