//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routing, data sources and load balancers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever `metrics` recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never formatted strings
//! - No metrics exporter is installed here; without a recorder the macros are no-ops

pub mod logging;
pub mod metrics;
