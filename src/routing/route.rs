//! Compiled routes.
//!
//! A `CompiledRoute` is what the matcher hands out: the definition it came
//! from, the resolved backend, instantiated filters and predicates, and the
//! conditions evaluated by the leaf matcher. It is never mutated after the
//! table that owns it is published.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, Method, Request};
use regex::Regex;

use crate::load_balancer::LoadBalancedBackend;
use crate::routing::definition::RouteDefinition;
use crate::routing::registry::{Filter, Predicate};

/// Trie placement of a route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TreePath {
    /// Path-less; evaluated in the root leaf list.
    #[default]
    None,
    /// Exact path, possibly with wildcards.
    Path(String),
    /// The path itself and everything below it.
    Subtree(String),
}

/// Request conditions evaluated after the trie lookup.
#[derive(Debug, Default)]
pub struct Conditions {
    pub method: Option<Method>,
    pub host_regexps: Vec<Regex>,
    pub path_regexps: Vec<Regex>,
    pub headers: Vec<(HeaderName, String)>,
    pub header_regexps: Vec<(HeaderName, Vec<Regex>)>,
}

impl Conditions {
    /// Number of non-empty condition categories.
    pub fn categories(&self) -> usize {
        [
            self.method.is_some(),
            !self.host_regexps.is_empty(),
            !self.path_regexps.is_empty(),
            !self.headers.is_empty(),
            !self.header_regexps.is_empty(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// A route ready for matching.
pub struct CompiledRoute {
    pub id: String,

    /// Position of the definition in the build input.
    pub index: usize,

    pub definition: Arc<RouteDefinition>,

    /// Scheme of a network backend, empty otherwise.
    pub scheme: String,

    /// Host (and port) of a network backend, empty otherwise.
    pub host: String,

    pub filters: Vec<Box<dyn Filter>>,

    pub predicates: Vec<Box<dyn Predicate>>,

    pub conditions: Conditions,

    pub tree_path: TreePath,

    /// Endpoints and algorithm, attached by the algorithm provider.
    pub load_balancer: Option<LoadBalancedBackend>,
}

impl CompiledRoute {
    /// Run every request filter in order.
    pub fn apply_request_filters(&self, req: &mut Request<Body>) {
        for filter in &self.filters {
            filter.request(req);
        }
    }

    /// Run every response filter in reverse order.
    pub fn apply_response_filters(&self, res: &mut axum::http::Response<Body>) {
        for filter in self.filters.iter().rev() {
            filter.response(res);
        }
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("filters", &self.filters.len())
            .field("predicates", &self.predicates.len())
            .field("tree_path", &self.tree_path)
            .field("load_balanced", &self.load_balancer.is_some())
            .finish()
    }
}
