//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → registries → data clients → routing pipeline → admin API
//!
//! Shutdown (shutdown.rs):
//!     Trigger → every task leaves its select loop → handles joined
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registries first, then sources, then the admin listener
//! - One broadcast signal for every task; no task outlives the engine

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
