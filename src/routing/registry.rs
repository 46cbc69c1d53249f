//! Filter and predicate registries.
//!
//! # Responsibilities
//! - Map filter and predicate names to their specs
//! - Instantiate filters/predicates from dynamic arguments at table build time
//!
//! # Design Decisions
//! - Registries are plain values built at startup and shared via `Arc`
//! - Specs are only consulted while building a table, never while matching

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::routing::definition::{Arg, ArgumentError};

/// A per-route request/response filter instance.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Applied to the request before it is forwarded.
    fn request(&self, _req: &mut Request<Body>) {}

    /// Applied to the response before it is returned to the client.
    fn response(&self, _res: &mut Response<Body>) {}
}

/// Creates filter instances from route arguments.
pub trait FilterSpec: Send + Sync {
    fn name(&self) -> &str;

    fn create_filter(&self, args: &[Arg]) -> Result<Box<dyn Filter>, ArgumentError>;
}

/// A runtime request condition evaluated inside leaf matching.
pub trait Predicate: Send + Sync + fmt::Debug {
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Creates predicate instances from route arguments.
pub trait PredicateSpec: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, args: &[Arg]) -> Result<Box<dyn Predicate>, ArgumentError>;
}

/// Filter specs by name.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    specs: HashMap<String, Arc<dyn FilterSpec>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec, replacing any previous spec with the same name.
    pub fn register(&mut self, spec: Arc<dyn FilterSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn FilterSpec>> {
        self.specs.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.specs.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("specs", &names).finish()
    }
}

/// Predicate specs by name.
#[derive(Default, Clone)]
pub struct PredicateRegistry {
    specs: HashMap<String, Arc<dyn PredicateSpec>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: Arc<dyn PredicateSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn PredicateSpec>> {
        self.specs.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.specs.keys().collect();
        names.sort();
        f.debug_struct("PredicateRegistry").field("specs", &names).finish()
    }
}
