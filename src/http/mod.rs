//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, dispatch by host)
//!     → request.rs (host, path, userinfo, forwarded-for chain)
//!     → [routing layer resolves target and rewrites URL]
//!     → forward.rs (plain HTTP round trip)
//!       or websocket.rs (dial backend, upgrade client)
//!         → relay.rs (full-duplex message pump)
//!     → response.rs (hop-by-hop stripping, proxy error responses)
//! ```

pub mod forward;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
