//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, host, headers, cookies)
//!     → context.rs (extract RequestContext once)
//!     → router.rs (walk rules in order)
//!     → matcher.rs (evaluate rule conditions)
//!     → Return: Decision or pass-through
//! ```
//!
//! # Design Decisions
//! - Rules compiled ahead of time, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always yields the same decision
//! - First match wins (declaration order)

pub mod context;
pub mod matcher;
pub mod router;

pub use context::RequestContext;
pub use router::{Decision, DecisionKind};
