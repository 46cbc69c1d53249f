//! Builtin predicates.
//!
//! `Method`, `Host`, `PathRegexp`, `Header` and `HeaderRegexp` are folded into leaf
//! conditions by the table builder and never reach the registry. The predicates here
//! run as custom conditions inside leaf matching.

pub mod host;
pub mod request;

use std::sync::Arc;

use crate::routing::registry::PredicateRegistry;

/// Registry with every builtin predicate.
pub fn builtin_predicates() -> PredicateRegistry {
    let mut registry = PredicateRegistry::new();
    registry.register(Arc::new(host::HostAnySpec));
    registry.register(Arc::new(request::QueryParamSpec));
    registry.register(Arc::new(request::CookieSpec));
    registry
}
