//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every route target must be a usable absolute URL
//! - At least one route must exist
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::{Target, TargetError};

/// A single semantic problem in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("route #{index} has an empty host")]
    EmptyHost { index: usize },

    #[error("route for {host:?}: {source}")]
    InvalidTarget {
        host: String,
        #[source]
        source: TargetError,
    },

    #[error("listener host is empty")]
    EmptyListenerHost,

    #[error("metrics address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyListenerHost);
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    for (index, route) in config.routes.iter().enumerate() {
        if route.host.is_empty() {
            errors.push(ValidationError::EmptyHost { index });
        }
        if let Err(source) = Target::parse(&route.target) {
            errors.push(ValidationError::InvalidTarget {
                host: route.host.clone(),
                source,
            });
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
