//! Builtin filters.
//!
//! Filter business logic is pluggable; these header filters cover the common
//! cases and give the registry something to resolve out of the box.

pub mod headers;

use std::sync::Arc;

use crate::routing::registry::FilterRegistry;

/// Registry with every builtin filter.
pub fn builtin_filters() -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    for spec in headers::specs() {
        registry.register(Arc::new(spec));
    }
    registry
}
