//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route sources (datasource.rs)
//!     → merged Snapshot of RouteDefinition (definition.rs)
//!     → builder.rs (compile filters, predicates, conditions; run post-processors)
//!     → matcher.rs (group by path, pathtrie.rs + leaf.rs)
//!     → publisher.rs (atomic swap of the immutable RouteTable)
//!
//! Incoming Request (method, host, path, headers)
//!     → publisher.rs (load current table)
//!     → matcher.rs (trie lookup, then root leaves)
//!     → Return: matched route and path parameters, or no match
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once published; every change builds a new one
//! - One invalid definition never blocks the rest of the table
//! - Deterministic: same definitions always produce the same matching behavior
//! - First match wins within a trie node, ordered by leaf weight

pub mod builder;
pub mod datasource;
pub mod definition;
pub mod error;
pub mod leaf;
pub mod matcher;
pub mod pathtrie;
pub mod publisher;
pub mod registry;
pub mod route;

pub use builder::{PostProcessor, RouteTable, RouteTableBuilder};
pub use datasource::{merge_loaded, DataClient, DataClientError, RouteUpdate, Snapshot, SourceAggregator};
pub use definition::{Arg, Backend, RouteDefinition};
pub use matcher::{MatchingOptions, RouteMatch};
pub use publisher::Routing;
