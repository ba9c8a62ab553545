//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → matcher.rs (extract + normalize hostname)
//!     → table.rs (hostname → Target)
//!     → rewrite.rs (Target + request → OutboundTarget)
//!
//! Table Compilation (at startup):
//!     RouteConfig[]
//!     → target.rs (parse & validate each target URL)
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Table built at startup, immutable at runtime
//! - Exact hostname match, no wildcards
//! - Deterministic: same request always yields the same outbound URL

pub mod matcher;
pub mod rewrite;
pub mod table;
pub mod target;

pub use matcher::HostMatching;
pub use rewrite::{rewrite, OutboundTarget, Protocol, RewriteError};
pub use table::{Route, RouteNotFound, RoutingTable};
pub use target::{Target, TargetError};
