//! Leaf matching.
//!
//! # Responsibilities
//! - Bind one compiled route to the trie node (or root list) it was placed in
//! - Evaluate the route's conditions against a request
//!
//! # Design Decisions
//! - Conditions combine with AND semantics and fail fast in a fixed order:
//!   exact path, method, host, path regexps, headers, predicates
//! - Host regexps match the Host header, falling back to the URI authority
//! - A missing header never satisfies a header condition

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::Request;
use regex::Regex;

use crate::routing::route::CompiledRoute;

/// One route's condition bundle inside a trie node or the root list.
#[derive(Debug, Clone)]
pub struct LeafMatcher {
    /// Set for path routes promoted into a subtree node; only this literal path matches.
    pub exact_path: Option<String>,
    pub weight: usize,
    pub route: Arc<CompiledRoute>,
}

impl LeafMatcher {
    pub fn new(route: Arc<CompiledRoute>) -> Self {
        Self::with_exact_path(route, None)
    }

    pub fn with_exact_path(route: Arc<CompiledRoute>, exact_path: Option<String>) -> Self {
        let weight = leaf_weight(&route, exact_path.is_some());
        Self {
            exact_path,
            weight,
            route,
        }
    }

    /// Input position of the route, used as the tie-break.
    pub fn order(&self) -> usize {
        self.route.index
    }
}

/// Number of non-empty condition categories of a leaf.
pub fn leaf_weight(route: &CompiledRoute, has_exact_path: bool) -> usize {
    usize::from(has_exact_path)
        + route.conditions.categories()
        + usize::from(!route.predicates.is_empty())
}

/// Order leaves by descending weight, earlier definitions first on ties.
pub fn sort_leaves(leaves: &mut [LeafMatcher]) {
    leaves.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.order().cmp(&b.order())));
}

fn request_host(req: &Request<Body>) -> &str {
    req.headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or("")
}

fn match_regexps(rxs: &[Regex], value: &str) -> bool {
    rxs.iter().all(|rx| rx.is_match(value))
}

/// Check a request against every condition of a leaf.
pub fn match_leaf(leaf: &LeafMatcher, req: &Request<Body>, path: &str) -> bool {
    if let Some(exact) = &leaf.exact_path {
        if exact != path {
            return false;
        }
    }

    let conditions = &leaf.route.conditions;

    if let Some(method) = &conditions.method {
        if req.method() != method {
            return false;
        }
    }

    if !conditions.host_regexps.is_empty() && !match_regexps(&conditions.host_regexps, request_host(req)) {
        return false;
    }

    if !match_regexps(&conditions.path_regexps, path) {
        return false;
    }

    for (name, expected) in &conditions.headers {
        let found = req
            .headers()
            .get_all(name)
            .iter()
            .any(|v| v.as_bytes() == expected.as_bytes());
        if !found {
            return false;
        }
    }

    for (name, rxs) in &conditions.header_regexps {
        for rx in rxs {
            let found = req
                .headers()
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|v| rx.is_match(v));
            if !found {
                return false;
            }
        }
    }

    leaf.route.predicates.iter().all(|p| p.matches(req))
}

/// First leaf, in order, that fully matches the request.
pub fn match_leaves<'l>(leaves: &'l [LeafMatcher], req: &Request<Body>, path: &str) -> Option<&'l LeafMatcher> {
    leaves.iter().find(|leaf| match_leaf(leaf, req, path))
}
