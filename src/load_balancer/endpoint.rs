//! Load-balanced endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single endpoint of a load-balanced route
//! - Normalize endpoint addresses (lower-case host, default port filled in)
//! - Track detection time, last sighting and in-flight requests

use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use url::Url;

use crate::routing::error::DefinitionError;

/// Live metrics of one endpoint, shared across table generations by the endpoint registry.
#[derive(Debug)]
pub struct EndpointMetrics {
    detected: Instant,
    last_seen: Mutex<Instant>,
    inflight: AtomicI64,
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::detected_at(Instant::now())
    }
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics for an endpoint first observed at `detected`.
    pub fn detected_at(detected: Instant) -> Self {
        Self {
            detected,
            last_seen: Mutex::new(detected),
            inflight: AtomicI64::new(0),
        }
    }

    /// When the endpoint was first observed.
    pub fn detected(&self) -> Instant {
        self.detected
    }

    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that the endpoint is still part of the routing table.
    pub fn touch(&self, now: Instant) {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if now > *last_seen {
            *last_seen = now;
        }
    }

    /// Current number of in-flight requests.
    pub fn inflight(&self) -> i64 {
        self.inflight.load(Ordering::Relaxed)
    }

    pub fn inc_inflight(&self) {
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_inflight(&self) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A single endpoint of a load-balanced route.
#[derive(Debug, Clone)]
pub struct LbEndpoint {
    pub scheme: String,
    /// Lower-cased `host:port`.
    pub host: String,
    pub metrics: Arc<EndpointMetrics>,
}

impl LbEndpoint {
    /// Parse an endpoint URL, filling in the scheme's default port.
    pub fn parse(raw: &str) -> Result<Self, DefinitionError> {
        let invalid = |reason: String| DefinitionError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid(format!("no default port for scheme {}", url.scheme())))?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: format!("{}:{}", host.to_lowercase(), port),
            metrics: Arc::new(EndpointMetrics::new()),
        })
    }

    /// Registry key, `scheme://host:port`.
    pub fn key(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Count a request as in flight until the guard is dropped.
    pub fn acquire(&self) -> InflightGuard {
        self.metrics.inc_inflight();
        InflightGuard {
            endpoint: self.clone(),
        }
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct InflightGuard {
    endpoint: LbEndpoint,
}

impl Deref for InflightGuard {
    type Target = LbEndpoint;
    fn deref(&self) -> &Self::Target {
        &self.endpoint
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.endpoint.metrics.dec_inflight();
    }
}
