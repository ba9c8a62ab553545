//! Outbound URL composition.
//!
//! Given the resolved [`Target`] and the inbound request, build the URL the
//! backend is reached at:
//!
//! ```text
//! scheme://[inbound userinfo@]target-authority[base-path]/inbound-path[?query][#fragment]
//! ```
//!
//! The composed string is re-parsed to validate it, but the path and query
//! sent on the wire are the composed strings, byte for byte. Inbound paths
//! with `.` or `..` segments are refused so a request cannot leave the
//! target's base path. The rewriter never consults the routing table;
//! callers resolve the target first.

use axum::http::HeaderValue;
use base64::Engine as _;
use thiserror::Error;
use url::Url;

use crate::http::request::InboundRequestContext;
use crate::routing::target::{authority_of, Target};

/// The composed URL is not a valid URL for the target.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewritten URL {url:?} is invalid: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("rewritten URL {url:?} does not address {expected}")]
    AuthorityMismatch { url: String, expected: String },

    #[error("request path {path:?} contains a dot segment")]
    DotSegment { path: String },
}

/// Which scheme family an outbound URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    WebSocket,
}

impl Protocol {
    fn scheme(self, secure: bool) -> &'static str {
        match (self, secure) {
            (Protocol::Http, false) => "http",
            (Protocol::Http, true) => "https",
            (Protocol::WebSocket, false) => "ws",
            (Protocol::WebSocket, true) => "wss",
        }
    }
}

/// URL computed for one request. Never reused across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTarget {
    composed: String,
    url: Url,
    scheme: &'static str,
    authority: String,
    path: String,
    query: Option<String>,
}

impl OutboundTarget {
    /// Parsed form, used for credentials and host checks.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The composed URL, including userinfo and fragment.
    pub fn as_str(&self) -> &str {
        &self.composed
    }

    /// Base path joined with the inbound path, unnormalized.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Inbound query, verbatim.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// URL as sent on the wire: no userinfo, no fragment.
    pub fn wire_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}://{}{}?{}", self.scheme, self.authority, self.path, query),
            None => format!("{}://{}{}", self.scheme, self.authority, self.path),
        }
    }

    /// `Authorization: Basic` value for passthrough credentials, if any.
    ///
    /// Credentials are encoded as they appear in the URL (percent-escaped).
    pub fn basic_authorization(&self) -> Option<HeaderValue> {
        let username = self.url.username();
        let password = self.url.password();
        if username.is_empty() && password.is_none() {
            return None;
        }
        let credentials = format!("{}:{}", username, password.unwrap_or_default());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        HeaderValue::from_str(&format!("Basic {}", encoded)).ok()
    }
}

impl std::fmt::Display for OutboundTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.composed)
    }
}

/// Compose the outbound URL for `inbound` against `target`.
pub fn rewrite(target: &Target, inbound: &InboundRequestContext) -> Result<OutboundTarget, RewriteError> {
    if has_dot_segment(&inbound.path) {
        return Err(RewriteError::DotSegment {
            path: inbound.path.clone(),
        });
    }

    let scheme = inbound.protocol.scheme(target.is_secure());
    let authority = target.authority();
    let path = join_paths(target.base_path(), &inbound.path);
    let query = inbound.query.clone().filter(|q| !q.is_empty());

    let mut composed = String::new();
    composed.push_str(scheme);
    composed.push_str("://");
    if let Some(userinfo) = inbound.userinfo.as_deref().filter(|u| !u.is_empty()) {
        composed.push_str(userinfo);
        composed.push('@');
    }
    composed.push_str(&authority);
    composed.push_str(&path);
    if let Some(query) = &query {
        composed.push('?');
        composed.push_str(query);
    }
    if let Some(fragment) = inbound.fragment.as_deref().filter(|f| !f.is_empty()) {
        composed.push('#');
        composed.push_str(fragment);
    }

    let url = match Url::parse(&composed) {
        Ok(url) => url,
        Err(source) => return Err(RewriteError::Parse { url: composed, source }),
    };

    // Inbound userinfo must not be able to redirect the request elsewhere.
    if authority_of(&url) != authority {
        return Err(RewriteError::AuthorityMismatch {
            url: composed,
            expected: authority,
        });
    }

    Ok(OutboundTarget {
        composed,
        url,
        scheme,
        authority,
        path,
        query,
    })
}

/// True if any segment is `.` or `..`, literally or percent-encoded.
///
/// `\` counts as a separator since WHATWG parsers treat it as one.
fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Join a base path (no trailing slash) and a request path with one slash.
fn join_paths(base: &str, path: &str) -> String {
    if path.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    let rest = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", base, rest)
}
