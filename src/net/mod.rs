//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound dial (HTTP or WebSocket)
//!     → tls.rs (shared rustls client configuration)
//!
//! Relay session lifecycle:
//!     connection.rs: Opened → Relaying → Closed
//! ```
//!
//! # Design Decisions
//! - One TLS client configuration per process, shared by both dialers
//! - Each relay session is tracked so teardown can be observed

pub mod connection;
pub mod tls;

pub use connection::{SessionGuard, SessionId, SessionTracker};
