//! Raw route definitions.
//!
//! # Responsibilities
//! - Describe a route independently of the source it was read from
//! - Carry filter and predicate references by name, with dynamic arguments
//! - Describe the backend: network address, shunt, loopback or load-balanced group
//!
//! # Design Decisions
//! - Definitions are immutable once read; the table builder shares them via `Arc`
//! - `Arg` only exists at the registry boundary, specs convert to typed values on creation
//! - Serde derives make the same type usable by the file data client and the admin API

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dynamic filter or predicate argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Number(n) => write!(f, "{}", n),
            Arg::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::String(s.to_string())
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Number(n)
    }
}

/// Error returned by filter and predicate specs when their arguments don't fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("expected {expected} arguments, got {got}")]
    Count { expected: String, got: usize },

    #[error("argument {index} must be a {expected}")]
    Type { index: usize, expected: &'static str },

    #[error("invalid argument: {0}")]
    Invalid(String),
}

/// Check the argument count is within `min..=max`.
pub fn expect_args(args: &[Arg], min: usize, max: usize) -> Result<(), ArgumentError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(ArgumentError::Count {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Read argument `index` as a string.
pub fn string_arg(args: &[Arg], index: usize) -> Result<&str, ArgumentError> {
    args.get(index)
        .and_then(Arg::as_str)
        .ok_or(ArgumentError::Type {
            index,
            expected: "string",
        })
}

/// A named predicate reference with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl PredicateDef {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// A named filter reference with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl FilterDef {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Warm-up settings for newly detected load-balanced endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeIn {
    /// Length of the warm-up window in milliseconds.
    pub duration_ms: u64,

    /// Curve exponent; 1 is linear.
    #[serde(default = "default_fade_in_exponent")]
    pub exponent: f64,
}

fn default_fade_in_exponent() -> f64 {
    1.0
}

impl FadeIn {
    pub fn new(duration: Duration, exponent: f64) -> Self {
        Self {
            duration_ms: duration.as_millis() as u64,
            exponent,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Where a matched request is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// A single backend URL, e.g. `https://service.internal:8443`.
    Network(String),

    /// No backend; filters produce the response.
    #[default]
    Shunt,

    /// Re-dispatch the (filtered) request into the routing table.
    Loopback,

    /// A group of endpoints with a balancing algorithm.
    LoadBalanced {
        endpoints: Vec<String>,
        #[serde(default)]
        algorithm: String,
        #[serde(default)]
        fade_in: Option<FadeIn>,
    },
}

impl Backend {
    pub fn network(url: impl Into<String>) -> Self {
        Backend::Network(url.into())
    }

    pub fn load_balanced(endpoints: &[&str], algorithm: &str) -> Self {
        Backend::LoadBalanced {
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            algorithm: algorithm.to_string(),
            fade_in: None,
        }
    }
}

/// A source-agnostic route definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouteDefinition {
    /// Route identifier, unique within a data source.
    pub id: String,

    /// Legacy path condition; equivalent to a `Path` predicate.
    pub path: String,

    /// HTTP method; empty matches any.
    pub method: String,

    /// Regular expressions the Host header must all match.
    pub host_regexps: Vec<String>,

    /// Regular expressions the normalized path must all match.
    pub path_regexps: Vec<String>,

    /// Headers that must be present with the exact value.
    pub headers: BTreeMap<String, String>,

    /// Headers that must be present with a value matching every regex.
    pub header_regexps: BTreeMap<String, Vec<String>>,

    pub predicates: Vec<PredicateDef>,

    pub filters: Vec<FilterDef>,

    pub backend: Backend,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>, backend: Backend) -> Self {
        Self {
            id: id.into(),
            backend,
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_predicate(mut self, name: &str, args: Vec<Arg>) -> Self {
        self.predicates.push(PredicateDef::new(name, args));
        self
    }

    pub fn with_filter(mut self, name: &str, args: Vec<Arg>) -> Self {
        self.filters.push(FilterDef::new(name, args));
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_load_balanced(&self) -> bool {
        matches!(self.backend, Backend::LoadBalanced { .. })
    }
}
