//! Proxy executor subsystem.
//!
//! # Data Flow
//! ```text
//! Request + Decision
//!     → executor.rs (shadowing, dispatch by decision kind)
//!     → static_files.rs (dist directory)
//!     → upstream.rs (framework dev server / external origin)
//!     → websocket.rs (upgrade tunnelling)
//!     → Response
//! ```

pub mod executor;
pub mod static_files;
pub mod upstream;
pub mod websocket;

pub use executor::Executor;
pub use upstream::UpstreamError;
