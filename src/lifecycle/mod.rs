//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Load rules → Start watcher → Start listeners
//!
//! Signals (signals.rs):
//!     Ctrl+C / SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → proxy listener + admin listener stop accepting
//!     → in-flight requests finish → watcher dropped → exit
//! ```
//!
//! # Design Decisions
//! - Listeners bind only after rules are loaded
//! - Rule errors at startup are fatal only in strict / required mode

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
