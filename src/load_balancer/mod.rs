//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Table build → provider.rs (parse endpoints, create algorithm per route)
//!     → registry.rs (share endpoint metrics across generations)
//!
//! Route matched → LoadBalancedBackend::select
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate from a random start)
//!         - random.rs (uniform choice)
//!         - consistent_hash.rs (sticky per key)
//!         - power_of_n.rs (fewest in-flight among N draws)
//!     → fade_in.rs (disfavor recently detected endpoints)
//!     → Return endpoint; caller holds an InflightGuard while forwarding
//! ```
//!
//! # Design Decisions
//! - Algorithm state is re-created every table generation
//! - Endpoint lists are immutable per generation; only metrics are shared
//! - Internal counters and random sources sit behind a mutex held for index
//!   arithmetic only

pub mod consistent_hash;
pub mod endpoint;
pub mod fade_in;
pub mod power_of_n;
pub mod provider;
pub mod random;
pub mod registry;
pub mod round_robin;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;

use crate::routing::definition::FadeIn;
use crate::routing::error::DefinitionError;

pub use endpoint::{EndpointMetrics, InflightGuard, LbEndpoint};

/// Default number of candidates drawn by power-of-random-N-choices.
pub const DEFAULT_POWER_OF_N_CHOICES: usize = 2;

/// Inputs of one endpoint selection.
#[derive(Debug, Clone, Copy)]
pub struct LbContext<'a> {
    pub endpoints: &'a [LbEndpoint],
    pub fade_in: Option<FadeIn>,
    pub request: Option<&'a Request<Body>>,
    /// Explicit consistent-hash key.
    pub hash_key: Option<&'a str>,
    pub remote_addr: Option<SocketAddr>,
    pub now: Instant,
}

impl<'a> LbContext<'a> {
    pub fn new(endpoints: &'a [LbEndpoint]) -> Self {
        Self {
            endpoints,
            fade_in: None,
            request: None,
            hash_key: None,
            remote_addr: None,
            now: Instant::now(),
        }
    }

    pub fn with_fade_in(mut self, fade_in: Option<FadeIn>) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_request(mut self, request: &'a Request<Body>) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_hash_key(mut self, key: &'a str) -> Self {
        self.hash_key = Some(key);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Evaluate fade-in at `now` instead of the creation instant.
    pub fn at(mut self, now: Instant) -> Self {
        self.now = now;
        self
    }
}

/// Trait for endpoint selection strategies.
pub trait Algorithm: Send + Sync + fmt::Debug {
    /// Select an endpoint; `None` only for an empty endpoint list.
    fn select<'a>(&self, ctx: &LbContext<'a>) -> Option<&'a LbEndpoint>;

    fn kind(&self) -> AlgorithmKind;
}

/// Supported algorithms by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    RoundRobin,
    Random,
    ConsistentHash,
    PowerOfRandomNChoices,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::RoundRobin => "roundRobin",
            AlgorithmKind::Random => "random",
            AlgorithmKind::ConsistentHash => "consistentHash",
            AlgorithmKind::PowerOfRandomNChoices => "powerOfRandomNChoices",
        }
    }

    /// Create a fresh algorithm instance for `endpoints` endpoints.
    pub fn create(self, endpoints: usize, power_of_n_choices: usize) -> Box<dyn Algorithm> {
        match self {
            AlgorithmKind::RoundRobin => Box::new(round_robin::RoundRobin::new(endpoints)),
            AlgorithmKind::Random => Box::new(random::RandomChoice::new()),
            AlgorithmKind::ConsistentHash => Box::new(consistent_hash::ConsistentHash::new()),
            AlgorithmKind::PowerOfRandomNChoices => {
                Box::new(power_of_n::PowerOfRandomNChoices::new(power_of_n_choices))
            }
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = DefinitionError;

    /// An empty name selects round robin.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "roundRobin" => Ok(AlgorithmKind::RoundRobin),
            "random" => Ok(AlgorithmKind::Random),
            "consistentHash" => Ok(AlgorithmKind::ConsistentHash),
            "powerOfRandomNChoices" => Ok(AlgorithmKind::PowerOfRandomNChoices),
            other => Err(DefinitionError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoints and algorithm of one load-balanced route.
#[derive(Debug)]
pub struct LoadBalancedBackend {
    pub endpoints: Vec<LbEndpoint>,
    pub algorithm: Box<dyn Algorithm>,
    pub fade_in: Option<FadeIn>,
}

impl LoadBalancedBackend {
    /// Select an endpoint for a request.
    pub fn select<'a>(
        &'a self,
        request: &'a Request<Body>,
        hash_key: Option<&'a str>,
    ) -> Option<&'a LbEndpoint> {
        let mut ctx = LbContext::new(&self.endpoints)
            .with_fade_in(self.fade_in)
            .with_request(request);
        ctx.hash_key = hash_key;
        self.algorithm.select(&ctx)
    }
}
