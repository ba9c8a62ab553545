//! Name-based reverse proxy for HTTP and WebSocket traffic.
//!
//! Requests are routed by their `Host` header to a configured backend URL.
//! Plain requests are forwarded with their path appended to the target's
//! base path; upgrade requests are relayed message by message.

pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use net::SessionTracker;
pub use routing::RoutingTable;
