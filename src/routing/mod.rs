//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route composition (at startup):
//!     (prefix, collaborator Router)[]
//!     → router.rs (reject duplicates, nest under prefix)
//!     → Freeze as one axum Router + RouteTable
//!
//! Incoming request path
//!     → axum dispatch into the owning collaborator
//!     → no mount claims it: not-found fallback
//! ```
//!
//! # Design Decisions
//! - Routes composed at startup, immutable at runtime
//! - Prefix matching only, on path segment boundaries
//! - Most specific prefix wins

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{RouteError, RouteTable, RouterGroup};
