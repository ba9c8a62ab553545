//! Response helpers and header hygiene.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Build the proxy's own failure responses
//!
//! # Design Decisions
//! - Unroutable plain requests get a descriptive 404 body
//! - Failed upgrades get no body; the protocol has nowhere to show it

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

use crate::routing::RouteNotFound;

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// True for headers that must not be forwarded to the next hop.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// 404 for a plain request to an unknown host.
pub fn route_not_found(err: &RouteNotFound) -> Response {
    (StatusCode::NOT_FOUND, format!("{}\n", err)).into_response()
}

/// 404 with an empty body, for an upgrade to an unknown host.
pub fn upgrade_not_found() -> Response {
    empty(StatusCode::NOT_FOUND)
}

/// 502 for a plain request the backend could not serve.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}

/// Body-less response that also asks the client to drop the connection.
pub fn empty(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONNECTION, "close")
        .body(Body::empty())
        .unwrap_or_else(|_| status.into_response())
}
