//! Consistent hash load balancing strategy.
//!
//! # Responsibilities
//! - Map a request key to an endpoint deterministically for a fixed endpoint set
//! - Resolve the key: explicit key, first `X-Forwarded-For` entry, remote address
//!
//! # Design Decisions
//! - 32-bit FNV-1a over the key bytes, reduced modulo the endpoint count
//! - A request without any usable key falls back to a uniform random choice,
//!   logged as an anomaly
//! - Fading endpoints that lose the fade-in draw are replaced by re-hashing over
//!   the settled endpoints, so keys stay sticky among those

use std::hash::Hasher;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use axum::extract::ConnectInfo;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{fade_in, Algorithm, AlgorithmKind, LbContext, LbEndpoint};
use crate::observability::metrics;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a32(u32);

impl Default for Fnv1a32 {
    fn default() -> Self {
        Fnv1a32(FNV_OFFSET_BASIS)
    }
}

impl Hasher for Fnv1a32 {
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u32::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

/// FNV-1a hash of a key.
pub fn hash_key(key: &str) -> u32 {
    let mut hasher = Fnv1a32::default();
    hasher.write(key.as_bytes());
    hasher.0
}

/// Key used to pick an endpoint for this context, if any.
pub fn request_key(ctx: &LbContext<'_>) -> Option<String> {
    if let Some(key) = ctx.hash_key {
        return Some(key.to_string());
    }

    if let Some(req) = ctx.request {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(forwarded) = forwarded {
            return Some(forwarded.to_string());
        }
    }

    if let Some(addr) = ctx.remote_addr {
        return Some(addr.ip().to_string());
    }

    ctx.request
        .and_then(|req| req.extensions().get::<ConnectInfo<SocketAddr>>())
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Consistent hash selector.
#[derive(Debug)]
pub struct ConsistentHash {
    rng: Mutex<StdRng>,
}

impl Default for ConsistentHash {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl ConsistentHash {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Algorithm for ConsistentHash {
    fn select<'a>(&self, ctx: &LbContext<'a>) -> Option<&'a LbEndpoint> {
        let len = ctx.endpoints.len();
        if len <= 1 {
            return ctx.endpoints.first();
        }

        let Some(key) = request_key(ctx) else {
            tracing::warn!(endpoints = len, "consistent hash without key, falling back to random choice");
            metrics::record_lb_fallback(AlgorithmKind::ConsistentHash.as_str());
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            return ctx.endpoints.get(rng.gen_range(0..len));
        };

        let hash = hash_key(&key) as usize;
        let choice = hash % len;
        if ctx.fade_in.is_none() || !fade_in::is_fading(ctx, &ctx.endpoints[choice]) {
            return ctx.endpoints.get(choice);
        }

        let keep = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            fade_in::apply(ctx, choice, &mut *rng) == choice
        };
        if keep {
            return ctx.endpoints.get(choice);
        }

        let settled = fade_in::settled_indices(ctx);
        if settled.is_empty() {
            return ctx.endpoints.get(choice);
        }
        ctx.endpoints.get(settled[hash % settled.len()])
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::ConsistentHash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::EndpointMetrics;
    use crate::routing::definition::FadeIn;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn endpoints(n: usize) -> Vec<LbEndpoint> {
        (0..n)
            .map(|i| LbEndpoint::parse(&format!("http://backend-{}:8080", i)).unwrap())
            .collect()
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(hash_key(""), 0x811c_9dc5);
        assert_eq!(hash_key("a"), 0xe40c_292c);
        assert_eq!(hash_key("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_same_key_same_endpoint() {
        let eps = endpoints(5);
        let lb = ConsistentHash::new();
        let ctx = LbContext::new(&eps).with_hash_key("session-17");
        let first = lb.select(&ctx).unwrap().host.clone();
        for _ in 0..50 {
            assert_eq!(lb.select(&ctx).unwrap().host, first);
        }
        assert_eq!(first, eps[hash_key("session-17") as usize % 5].host);
    }

    #[test]
    fn test_different_keys_spread() {
        let eps = endpoints(4);
        let lb = ConsistentHash::new();
        let mut hit = std::collections::HashSet::new();
        for i in 0..200 {
            let key = format!("client-{}", i);
            let ctx = LbContext::new(&eps).with_hash_key(&key);
            hit.insert(lb.select(&ctx).unwrap().host.clone());
        }
        assert_eq!(hit.len(), 4);
    }

    #[test]
    fn test_key_resolution_order() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        let eps = endpoints(2);

        let ctx = LbContext::new(&eps).with_request(&req).with_remote_addr(addr);
        assert_eq!(request_key(&ctx).as_deref(), Some("203.0.113.9"));
        assert_eq!(request_key(&ctx.with_hash_key("explicit")).as_deref(), Some("explicit"));

        let plain = Request::builder().body(Body::empty()).unwrap();
        let ctx = LbContext::new(&eps).with_request(&plain).with_remote_addr(addr);
        assert_eq!(request_key(&ctx).as_deref(), Some("192.0.2.1"));

        let mut connected = Request::builder().body(Body::empty()).unwrap();
        connected.extensions_mut().insert(ConnectInfo(addr));
        let ctx = LbContext::new(&eps).with_request(&connected);
        assert_eq!(request_key(&ctx).as_deref(), Some("192.0.2.1"));

        assert_eq!(request_key(&LbContext::new(&eps)), None);
    }

    #[test]
    fn test_missing_key_falls_back() {
        let eps = endpoints(3);
        let lb = ConsistentHash::new();
        assert!(lb.select(&LbContext::new(&eps)).is_some());
    }

    #[test]
    fn test_cold_endpoint_rehashes_over_settled() {
        let start = Instant::now();
        let mut eps = endpoints(3);
        let key = (0..)
            .map(|i| format!("k{}", i))
            .find(|k| hash_key(k) as usize % 3 == 2)
            .unwrap();
        for ep in eps.iter_mut().take(2) {
            ep.metrics = Arc::new(EndpointMetrics::detected_at(start));
        }
        eps[2].metrics = Arc::new(EndpointMetrics::detected_at(start + Duration::from_secs(60)));

        let lb = ConsistentHash::new();
        let ctx = LbContext::new(&eps)
            .with_hash_key(&key)
            .with_fade_in(Some(FadeIn::new(Duration::from_secs(60), 1.0)))
            .at(start + Duration::from_secs(60));

        let expected = &eps[hash_key(&key) as usize % 2].host;
        for _ in 0..20 {
            assert_eq!(&lb.select(&ctx).unwrap().host, expected);
        }
    }
}
