//! Backend target descriptors.
//!
//! # Responsibilities
//! - Parse a configured target URL once at startup
//! - Enforce the scheme/host invariants
//! - Expose the pieces the rewriter needs (authority, base path, TLS flag)

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Schemes a target may use.
pub const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

/// Error produced when a configured target cannot be used.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target {raw:?} is not an absolute URL: {source}")]
    Parse {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target {raw:?} uses unsupported scheme {scheme:?} (expected http, https, ws or wss)")]
    UnsupportedScheme { raw: String, scheme: String },

    #[error("target {raw:?} has no host")]
    MissingHost { raw: String },
}

/// A backend a hostname is routed to.
///
/// Only scheme, host, port and path are used. Userinfo, query and fragment
/// of the configured URL are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Parse and validate a target URL.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw).map_err(|source| TargetError::Parse {
            raw: raw.to_string(),
            source,
        })?;

        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(TargetError::UnsupportedScheme {
                raw: raw.to_string(),
                scheme: url.scheme().to_string(),
            });
        }

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(TargetError::MissingHost {
                    raw: raw.to_string(),
                })
            }
        }

        Ok(Self { url })
    }

    /// Scheme as configured (`http`, `https`, `ws` or `wss`).
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// True when the backend expects TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self.url.scheme(), "https" | "wss")
    }

    /// `host[:port]`; the port is omitted when it is the scheme default.
    pub fn authority(&self) -> String {
        authority_of(&self.url)
    }

    /// Base path without trailing slashes. Empty for a root target.
    pub fn base_path(&self) -> &str {
        self.url.path().trim_end_matches('/')
    }

    /// The parsed URL.
    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

/// `host[:port]` of any URL, formatted like [`Target::authority`].
pub(crate) fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
