//! Route table engine for an HTTP reverse proxy.
//!
//! Route definitions from any number of data sources are merged, compiled into an
//! immutable trie-based table and swapped in atomically whenever a source changes.
//! Load-balanced routes carry a per-route selection algorithm with endpoint fade-in.

pub mod admin;
pub mod config;
pub mod dataclient;
pub mod filters;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod predicates;
pub mod routing;

pub use config::schema::EngineConfig;
pub use lifecycle::Shutdown;
pub use routing::Routing;
