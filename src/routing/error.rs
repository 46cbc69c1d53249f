//! Route definition errors.

use std::sync::Arc;

use thiserror::Error;

use crate::routing::definition::{ArgumentError, RouteDefinition};
use crate::routing::pathtrie::TrieError;

/// Why a single route was excluded from the table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("filter not found: {0}")]
    UnknownFilter(String),

    #[error("failed to create filter {name}: {source}")]
    FilterCreation {
        name: String,
        #[source]
        source: ArgumentError,
    },

    #[error("predicate not found: {0}")]
    UnknownPredicate(String),

    #[error("failed to create predicate {name}: {source}")]
    PredicateCreation {
        name: String,
        #[source]
        source: ArgumentError,
    },

    #[error("Path and PathSubtree predicates are mutually exclusive")]
    ConflictingTreePredicates,

    #[error("duplicate {0} predicate")]
    DuplicateTreePredicate(&'static str),

    #[error("duplicate method condition")]
    DuplicateMethod,

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("invalid backend url {url:?}: {reason}")]
    InvalidBackend { url: String, reason: String },

    #[error("load balanced route without endpoints")]
    NoEndpoints,

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid fade-in exponent {0}: must be finite and positive")]
    InvalidFadeIn(f64),

    #[error("unsupported load balancing algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error(transparent)]
    PathConflict(#[from] TrieError),
}

/// A rejected definition with its position in the build input.
#[derive(Debug, Clone)]
pub struct InvalidRoute {
    pub id: String,
    pub index: usize,
    pub definition: Arc<RouteDefinition>,
    pub error: DefinitionError,
}

impl InvalidRoute {
    pub fn new(index: usize, definition: Arc<RouteDefinition>, error: DefinitionError) -> Self {
        Self {
            id: definition.id.clone(),
            index,
            definition,
            error,
        }
    }
}

impl std::fmt::Display for InvalidRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.index, self.error)
    }
}
