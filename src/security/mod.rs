//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client sliding window)
//!     → headers.rs (hardening response headers)
//!     → cors.rs (cross-origin policy, preflights)
//!     → sanitize.rs (markup escaping, operator key removal)
//!     → Pass to the parsers and routing
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Rejection happens before any parsing work
//! - No trust in client input

pub mod cors;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;
