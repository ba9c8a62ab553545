//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Point the request at the rewritten backend URL
//! - Strip hop-by-hop headers in both directions
//! - Extend `X-Forwarded-For`
//! - Stream request and response bodies through the pooled client
//!
//! # Design Decisions
//! - The original `Host` header is forwarded unchanged
//! - No retries; backend failures surface as 502

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Uri, Version},
    response::Response,
};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::request::{forwarded_for_chain, InboundRequestContext, X_FORWARDED_FOR};
use crate::http::response::strip_hop_by_hop;
use crate::routing::{rewrite, Protocol, RewriteError, Target};

/// Pooled HTTP/1.1 client for `http` and `https` backends.
pub type ForwardClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Why a plain request could not be forwarded.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("rewritten URL is not a valid request URI: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUri),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Build the forwarding client around the shared TLS configuration.
pub fn build_client(tls: Arc<rustls::ClientConfig>) -> ForwardClient {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config((*tls).clone())
        .https_or_http()
        .enable_http1()
        .build();

    Client::builder(TokioExecutor::new()).build(connector)
}

/// Forward `request` to `target` and return the backend's response.
pub async fn forward(
    client: &ForwardClient,
    request: Request<Body>,
    target: &Target,
    client_addr: SocketAddr,
) -> Result<Response, ForwardError> {
    let (mut parts, body) = request.into_parts();

    let inbound = InboundRequestContext::from_parts(&parts, Protocol::Http);
    let outbound = rewrite(target, &inbound)?;
    let uri: Uri = outbound.wire_url().as_str().parse()?;

    let forwarded_for = forwarded_for_chain(&parts.headers, client_addr.ip());
    strip_hop_by_hop(&mut parts.headers);
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        parts.headers.insert(X_FORWARDED_FOR, value);
    }
    // HTTP/2 clients send `:authority` instead of `Host`.
    if !parts.headers.contains_key(header::HOST) {
        if let Some(host) = inbound.host.as_deref().and_then(|h| HeaderValue::from_str(h).ok()) {
            parts.headers.insert(header::HOST, host);
        }
    }
    if !parts.headers.contains_key(header::AUTHORIZATION) {
        if let Some(credentials) = outbound.basic_authorization() {
            parts.headers.insert(header::AUTHORIZATION, credentials);
        }
    }

    tracing::debug!(
        method = %parts.method,
        upstream = %uri,
        "Forwarding request"
    );

    parts.uri = uri;
    parts.version = Version::HTTP_11;

    let response = client.request(Request::from_parts(parts, body)).await?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
