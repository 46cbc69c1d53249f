//! Route table construction.
//!
//! # Responsibilities
//! - Compile definitions: backend URL, conditions, tree path, predicates, filters
//! - Run post-processors (algorithm provisioning, endpoint registry)
//! - Build the matcher and collect every rejected definition with its cause
//!
//! # Data Flow
//! ```text
//! RouteDefinition[]
//!     → compile (per definition, failures recorded, build continues)
//!     → post-processors (may reject more routes)
//!     → Matcher::new (path conflicts reject whole groups)
//!     → RouteTable { matcher, valid, invalid, created, generation }
//! ```
//!
//! # Design Decisions
//! - A bad definition never fails the build, it is only excluded
//! - `Method`, `Host`, `PathRegexp`, `Header` and `HeaderRegexp` predicates are
//!   folded into compiled conditions; `Path` and `PathSubtree` decide trie placement
//! - Valid and invalid lists keep input order

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::body::Body;
use axum::http::{HeaderName, Method, Request};
use regex::Regex;
use url::Url;

use crate::observability::metrics;
use crate::routing::definition::{expect_args, string_arg, Backend, PredicateDef, RouteDefinition};
use crate::routing::error::{DefinitionError, InvalidRoute};
use crate::routing::matcher::{Matcher, MatchingOptions, RouteMatch};
use crate::routing::registry::{FilterRegistry, PredicateRegistry};
use crate::routing::route::{CompiledRoute, Conditions, TreePath};

/// Hook run over the compiled routes of a build, before the matcher is created.
/// Implementations must keep the input order of the routes they return.
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, routes: Vec<CompiledRoute>) -> (Vec<CompiledRoute>, Vec<InvalidRoute>);
}

/// One immutable generation of the routing table.
#[derive(Debug)]
pub struct RouteTable {
    matcher: Matcher,
    routes: Vec<Arc<CompiledRoute>>,
    valid: Vec<Arc<RouteDefinition>>,
    invalid: Vec<InvalidRoute>,
    created: SystemTime,
    generation: u64,
}

impl RouteTable {
    /// A table without routes, published before the first build.
    pub fn empty() -> Self {
        Self {
            matcher: Matcher::default(),
            routes: Vec::new(),
            valid: Vec::new(),
            invalid: Vec::new(),
            created: SystemTime::now(),
            generation: 0,
        }
    }

    pub fn match_request(&self, req: &Request<Body>) -> Option<RouteMatch> {
        self.matcher.match_request(req)
    }

    /// Compiled routes in input order.
    pub fn routes(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    pub fn route(&self, id: &str) -> Option<&Arc<CompiledRoute>> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn valid(&self) -> &[Arc<RouteDefinition>] {
        &self.valid
    }

    pub fn invalid(&self) -> &[InvalidRoute] {
        &self.invalid
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Compiles definitions into route tables.
#[derive(Clone)]
pub struct RouteTableBuilder {
    filters: Arc<FilterRegistry>,
    predicates: Arc<PredicateRegistry>,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    options: MatchingOptions,
}

impl std::fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.post_processors.iter().map(|p| p.name()).collect();
        f.debug_struct("RouteTableBuilder")
            .field("filters", &self.filters)
            .field("predicates", &self.predicates)
            .field("post_processors", &names)
            .field("options", &self.options)
            .finish()
    }
}

impl RouteTableBuilder {
    pub fn new(filters: Arc<FilterRegistry>, predicates: Arc<PredicateRegistry>) -> Self {
        Self {
            filters,
            predicates,
            post_processors: Vec::new(),
            options: MatchingOptions::NONE,
        }
    }

    pub fn with_options(mut self, options: MatchingOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a post-processor; they run in registration order.
    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Compile one definition.
    pub fn compile(&self, index: usize, definition: Arc<RouteDefinition>) -> Result<CompiledRoute, DefinitionError> {
        let (scheme, host) = match &definition.backend {
            Backend::Network(url) => split_backend_url(url)?,
            Backend::Shunt | Backend::Loopback | Backend::LoadBalanced { .. } => (String::new(), String::new()),
        };

        let mut conditions = Conditions {
            method: None,
            host_regexps: compile_regexps(&definition.host_regexps)?,
            path_regexps: compile_regexps(&definition.path_regexps)?,
            headers: Vec::with_capacity(definition.headers.len()),
            header_regexps: Vec::with_capacity(definition.header_regexps.len()),
        };
        if !definition.method.is_empty() {
            conditions.method = Some(parse_method(&definition.method)?);
        }
        for (name, value) in &definition.headers {
            conditions.headers.push((header_name(name)?, value.clone()));
        }
        for (name, exps) in &definition.header_regexps {
            conditions
                .header_regexps
                .push((header_name(name)?, compile_regexps(exps)?));
        }

        let mut tree_path = TreePath::None;
        if !definition.path.is_empty() {
            tree_path = TreePath::Path(definition.path.clone());
        }

        let mut predicates = Vec::new();
        for predicate in &definition.predicates {
            match predicate.name.as_str() {
                "Path" => {
                    let path = sugar_arg(predicate, 1, 0)?;
                    set_tree_path(&mut tree_path, TreePath::Path(path.to_string()))?;
                }
                "PathSubtree" => {
                    let path = sugar_arg(predicate, 1, 0)?;
                    set_tree_path(&mut tree_path, TreePath::Subtree(path.to_string()))?;
                }
                "Method" => {
                    if conditions.method.is_some() {
                        return Err(DefinitionError::DuplicateMethod);
                    }
                    conditions.method = Some(parse_method(sugar_arg(predicate, 1, 0)?)?);
                }
                "Host" => {
                    conditions.host_regexps.push(compile_regex(sugar_arg(predicate, 1, 0)?)?);
                }
                "PathRegexp" => {
                    conditions.path_regexps.push(compile_regex(sugar_arg(predicate, 1, 0)?)?);
                }
                "Header" => {
                    let name = header_name(sugar_arg(predicate, 2, 0)?)?;
                    let value = sugar_arg(predicate, 2, 1)?;
                    conditions.headers.push((name, value.to_string()));
                }
                "HeaderRegexp" => {
                    let name = header_name(sugar_arg(predicate, 2, 0)?)?;
                    let rx = compile_regex(sugar_arg(predicate, 2, 1)?)?;
                    match conditions.header_regexps.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, rxs)) => rxs.push(rx),
                        None => conditions.header_regexps.push((name, vec![rx])),
                    }
                }
                name => {
                    let spec = self
                        .predicates
                        .lookup(name)
                        .ok_or_else(|| DefinitionError::UnknownPredicate(name.to_string()))?;
                    let instance = spec
                        .create(&predicate.args)
                        .map_err(|source| DefinitionError::PredicateCreation {
                            name: name.to_string(),
                            source,
                        })?;
                    predicates.push(instance);
                }
            }
        }

        let mut filters = Vec::with_capacity(definition.filters.len());
        for filter in &definition.filters {
            let spec = self
                .filters
                .lookup(&filter.name)
                .ok_or_else(|| DefinitionError::UnknownFilter(filter.name.clone()))?;
            let instance = spec
                .create_filter(&filter.args)
                .map_err(|source| DefinitionError::FilterCreation {
                    name: filter.name.clone(),
                    source,
                })?;
            filters.push(instance);
        }

        Ok(CompiledRoute {
            id: definition.id.clone(),
            index,
            definition,
            scheme,
            host,
            filters,
            predicates,
            conditions,
            tree_path,
            load_balancer: None,
        })
    }

    /// Build a complete table from a snapshot of definitions.
    pub fn build(&self, definitions: &[Arc<RouteDefinition>], generation: u64) -> RouteTable {
        let started = Instant::now();
        let mut invalid = Vec::new();
        let mut compiled = Vec::with_capacity(definitions.len());

        for (index, definition) in definitions.iter().enumerate() {
            match self.compile(index, definition.clone()) {
                Ok(route) => compiled.push(route),
                Err(error) => invalid.push(InvalidRoute::new(index, definition.clone(), error)),
            }
        }

        for processor in &self.post_processors {
            let (routes, rejected) = processor.process(compiled);
            compiled = routes;
            invalid.extend(rejected);
        }

        let routes: Vec<Arc<CompiledRoute>> = compiled.into_iter().map(Arc::new).collect();
        let (matcher, conflicts) = Matcher::new(routes.clone(), self.options);

        let conflicting: HashSet<usize> = conflicts.iter().map(|(route, _)| route.index).collect();
        invalid.extend(
            conflicts
                .into_iter()
                .map(|(route, error)| InvalidRoute::new(route.index, route.definition.clone(), error)),
        );
        invalid.sort_by_key(|r| r.index);

        let routes: Vec<Arc<CompiledRoute>> = routes
            .into_iter()
            .filter(|route| !conflicting.contains(&route.index))
            .collect();
        let valid: Vec<Arc<RouteDefinition>> = routes.iter().map(|r| r.definition.clone()).collect();

        for rejected in &invalid {
            tracing::warn!(
                route_id = %rejected.id,
                index = rejected.index,
                error = %rejected.error,
                "route rejected"
            );
        }

        let elapsed = started.elapsed();
        metrics::record_table_build(generation, valid.len(), invalid.len(), elapsed);
        tracing::info!(
            generation,
            valid = valid.len(),
            invalid = invalid.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "routing table built"
        );

        RouteTable {
            matcher,
            routes,
            valid,
            invalid,
            created: SystemTime::now(),
            generation,
        }
    }
}

fn sugar_arg(predicate: &PredicateDef, count: usize, index: usize) -> Result<&str, DefinitionError> {
    let creation = |source| DefinitionError::PredicateCreation {
        name: predicate.name.clone(),
        source,
    };
    expect_args(&predicate.args, count, count).map_err(creation)?;
    string_arg(&predicate.args, index).map_err(creation)
}

fn set_tree_path(current: &mut TreePath, next: TreePath) -> Result<(), DefinitionError> {
    match (&*current, &next) {
        (TreePath::None, _) => {
            *current = next;
            Ok(())
        }
        (TreePath::Path(_), TreePath::Path(_)) => Err(DefinitionError::DuplicateTreePredicate("Path")),
        (TreePath::Subtree(_), TreePath::Subtree(_)) => {
            Err(DefinitionError::DuplicateTreePredicate("PathSubtree"))
        }
        _ => Err(DefinitionError::ConflictingTreePredicates),
    }
}

fn split_backend_url(raw: &str) -> Result<(String, String), DefinitionError> {
    let invalid = |reason: String| DefinitionError::InvalidBackend {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok((url.scheme().to_string(), host))
}

fn parse_method(method: &str) -> Result<Method, DefinitionError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| DefinitionError::InvalidMethod(method.to_string()))
}

fn header_name(name: &str) -> Result<HeaderName, DefinitionError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| DefinitionError::InvalidHeaderName(name.to_string()))
}

fn compile_regex(pattern: &str) -> Result<Regex, DefinitionError> {
    Regex::new(pattern).map_err(|e| DefinitionError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn compile_regexps(patterns: &[String]) -> Result<Vec<Regex>, DefinitionError> {
    patterns.iter().map(|p| compile_regex(p)).collect()
}
