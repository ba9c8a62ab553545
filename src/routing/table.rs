//! Route lookup.
//!
//! # Responsibilities
//! - Store one target per hostname
//! - Look up the target for a request's host
//! - Return an explicit not-found rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - O(1) host lookup via HashMap
//! - Later entries for the same hostname replace earlier ones

use std::collections::HashMap;

use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::matcher::HostMatching;
use crate::routing::target::{Target, TargetError};

/// No route is registered for the requested host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Proxy does not know where to forward requests for {host}")]
pub struct RouteNotFound {
    pub host: String,
}

/// A hostname and the backend it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub host: String,
    pub target: Target,
}

/// Hostname → target table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Route>,
    matching: HostMatching,
}

impl RoutingTable {
    /// Build a table from ordered `(hostname, target)` pairs.
    ///
    /// Fails on the first target that does not parse.
    pub fn build<I, H, T>(pairs: I, matching: HostMatching) -> Result<Self, TargetError>
    where
        I: IntoIterator<Item = (H, T)>,
        H: Into<String>,
        T: AsRef<str>,
    {
        let mut routes = HashMap::new();
        for (host, target) in pairs {
            let host = host.into();
            let target = Target::parse(target.as_ref())?;
            let key = matching.key(&host).into_owned();
            if let Some(previous) = routes.insert(key, Route { host: host.clone(), target }) {
                tracing::warn!(
                    host = %host,
                    replaced = %previous.target,
                    "Duplicate route, later entry wins"
                );
            }
        }
        Ok(Self { routes, matching })
    }

    /// Build a table from configured routes.
    pub fn from_config(routes: &[RouteConfig], matching: HostMatching) -> Result<Self, TargetError> {
        Self::build(
            routes.iter().map(|r| (r.host.clone(), r.target.as_str())),
            matching,
        )
    }

    /// Target registered for `host`.
    pub fn lookup(&self, host: &str) -> Result<&Target, RouteNotFound> {
        self.routes
            .get(self.matching.key(host).as_ref())
            .map(|route| &route.target)
            .ok_or_else(|| RouteNotFound {
                host: host.to_string(),
            })
    }

    /// Iterate over the registered routes (unordered).
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
