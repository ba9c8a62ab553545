//! Hostname matching.
//!
//! # Responsibilities
//! - Extract the routing hostname from a request
//! - Normalize hostnames into table keys
//!
//! # Design Decisions
//! - Exact, byte-for-byte matching by default; the port is part of the key
//! - ASCII case folding is opt-in
//! - No wildcards, no suffix matching

use std::borrow::Cow;

use axum::http::{header, HeaderMap, Request, Uri};
use serde::{Deserialize, Serialize};

/// How a request's host is compared against configured hostnames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMatching {
    /// Raw `Host` value must equal the configured hostname.
    #[default]
    Exact,
    /// Hostnames are compared after ASCII lowercasing.
    CaseInsensitive,
}

impl HostMatching {
    /// Turn a hostname into the key stored in (and looked up in) the table.
    pub fn key<'a>(&self, host: &'a str) -> Cow<'a, str> {
        match self {
            HostMatching::Exact => Cow::Borrowed(host),
            HostMatching::CaseInsensitive if host.bytes().any(|b| b.is_ascii_uppercase()) => {
                Cow::Owned(host.to_ascii_lowercase())
            }
            HostMatching::CaseInsensitive => Cow::Borrowed(host),
        }
    }
}

/// Hostname a request is addressed to.
///
/// Uses the `Host` header as received. HTTP/2 requests carry no `Host`
/// header, so the `:authority` (URI authority) is used instead.
pub fn request_host<B>(req: &Request<B>) -> Option<&str> {
    request_host_from(req.headers(), req.uri())
}

/// [`request_host`] over a request head that has already been split.
pub fn request_host_from<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().and_then(|a| a.as_str().rsplit('@').next()))
}
