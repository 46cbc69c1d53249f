//! Endpoint registry.
//!
//! # Responsibilities
//! - Keep endpoint metrics alive across table generations
//! - Record when an endpoint was first detected and last seen
//! - Evict endpoints that have not been part of a table for a while
//!
//! # Design Decisions
//! - Runs as the last post-processor, after the algorithm provider
//! - Keyed by `scheme://host:port`; network backends are tracked as well so the
//!   admin API lists every upstream

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::load_balancer::EndpointMetrics;
use crate::routing::builder::PostProcessor;
use crate::routing::error::InvalidRoute;
use crate::routing::route::CompiledRoute;

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: String,
    pub inflight: i64,
    pub detected_secs_ago: f64,
    pub last_seen_secs_ago: f64,
}

/// Shared endpoint metrics by endpoint key.
#[derive(Debug)]
pub struct EndpointRegistry {
    entries: DashMap<String, Arc<EndpointMetrics>>,
    last_seen_timeout: Duration,
}

impl EndpointRegistry {
    pub fn new(last_seen_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            last_seen_timeout,
        }
    }

    /// Metrics for `key`, creating an entry detected at `now` if missing.
    pub fn metrics(&self, key: &str, now: Instant) -> Arc<EndpointMetrics> {
        let metrics = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(EndpointMetrics::detected_at(now)))
            .clone();
        metrics.touch(now);
        metrics
    }

    pub fn get(&self, key: &str) -> Option<Arc<EndpointMetrics>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries not seen since `now - last_seen_timeout`.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, metrics| now.saturating_duration_since(metrics.last_seen()) <= self.last_seen_timeout);
        before.saturating_sub(self.entries.len())
    }

    /// Entries sorted by key.
    pub fn snapshot(&self) -> Vec<EndpointSnapshot> {
        let now = Instant::now();
        let mut snapshot: Vec<_> = self
            .entries
            .iter()
            .map(|entry| EndpointSnapshot {
                endpoint: entry.key().clone(),
                inflight: entry.value().inflight(),
                detected_secs_ago: now.saturating_duration_since(entry.value().detected()).as_secs_f64(),
                last_seen_secs_ago: now.saturating_duration_since(entry.value().last_seen()).as_secs_f64(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshot
    }

    /// Attach shared metrics to every endpoint of the given routes.
    pub fn observe(&self, routes: &mut [CompiledRoute], now: Instant) {
        for route in routes.iter_mut() {
            if let Some(lb) = route.load_balancer.as_mut() {
                for endpoint in lb.endpoints.iter_mut() {
                    endpoint.metrics = self.metrics(&endpoint.key(), now);
                }
            } else if !route.host.is_empty() {
                self.metrics(&format!("{}://{}", route.scheme, route.host), now);
            }
        }
    }
}

impl PostProcessor for EndpointRegistry {
    fn name(&self) -> &'static str {
        "endpoint-registry"
    }

    fn process(&self, mut routes: Vec<CompiledRoute>) -> (Vec<CompiledRoute>, Vec<InvalidRoute>) {
        let now = Instant::now();
        self.observe(&mut routes, now);

        let evicted = self.evict_stale(now);
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.len(), "evicted stale endpoints");
        }

        (routes, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_time_survives_lookups() {
        let registry = EndpointRegistry::new(Duration::from_secs(60));
        let start = Instant::now();

        let first = registry.metrics("http://a:80", start);
        let again = registry.metrics("http://a:80", start + Duration::from_secs(10));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.detected(), start);
        assert_eq!(again.last_seen(), start + Duration::from_secs(10));
    }

    #[test]
    fn test_eviction_after_timeout() {
        let registry = EndpointRegistry::new(Duration::from_secs(60));
        let start = Instant::now();

        registry.metrics("http://old:80", start);
        registry.metrics("http://new:80", start + Duration::from_secs(50));

        assert_eq!(registry.evict_stale(start + Duration::from_secs(61)), 1);
        assert!(registry.get("http://old:80").is_none());
        assert!(registry.get("http://new:80").is_some());

        // a re-appearing endpoint is detected again
        let back = registry.metrics("http://old:80", start + Duration::from_secs(70));
        assert_eq!(back.detected(), start + Duration::from_secs(70));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = EndpointRegistry::new(Duration::from_secs(60));
        let now = Instant::now();
        registry.metrics("http://b:80", now);
        registry.metrics("http://a:80", now);
        let keys: Vec<_> = registry.snapshot().into_iter().map(|s| s.endpoint).collect();
        assert_eq!(keys, ["http://a:80", "http://b:80"]);
    }
}
