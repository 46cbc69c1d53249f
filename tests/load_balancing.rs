//! Distribution properties of the load balancing algorithms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use routing_engine::load_balancer::provider::AlgorithmProvider;
use routing_engine::load_balancer::{AlgorithmKind, EndpointMetrics, LbContext, LbEndpoint};
use routing_engine::routing::builder::RouteTableBuilder;
use routing_engine::routing::definition::{Backend, FadeIn, RouteDefinition};
use routing_engine::routing::registry::{FilterRegistry, PredicateRegistry};

mod common;

fn endpoints(n: usize) -> Vec<LbEndpoint> {
    (0..n)
        .map(|i| LbEndpoint::parse(&format!("http://10.0.0.{}:8080", i + 1)).unwrap())
        .collect()
}

fn counts<'a>(selected: impl Iterator<Item = &'a LbEndpoint>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for endpoint in selected {
        *counts.entry(endpoint.host.clone()).or_default() += 1;
    }
    counts
}

#[test]
fn test_round_robin_is_exactly_even() {
    let eps = endpoints(3);
    let algorithm = AlgorithmKind::RoundRobin.create(eps.len(), 2);
    let ctx = LbContext::new(&eps);

    let counts = counts((0..300).map(|_| algorithm.select(&ctx).unwrap()));
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|c| *c == 100), "{:?}", counts);
}

#[test]
fn test_random_is_roughly_uniform() {
    let eps = endpoints(4);
    let algorithm = AlgorithmKind::Random.create(eps.len(), 2);
    let ctx = LbContext::new(&eps);

    let counts = counts((0..8000).map(|_| algorithm.select(&ctx).unwrap()));
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|c| (1600..2400).contains(c)), "{:?}", counts);
}

#[test]
fn test_consistent_hash_follows_forwarded_client() {
    let eps = endpoints(5);
    let algorithm = AlgorithmKind::ConsistentHash.create(eps.len(), 2);

    let request = |client: &str| {
        Request::builder()
            .header("X-Forwarded-For", format!("{}, 10.1.1.1", client))
            .body(Body::empty())
            .unwrap()
    };

    let mut spread = HashMap::new();
    for i in 0..100 {
        let client = format!("198.51.100.{}", i);
        let req = request(&client);
        let ctx = LbContext::new(&eps).with_request(&req);
        let first = algorithm.select(&ctx).unwrap().host.clone();
        for _ in 0..5 {
            assert_eq!(algorithm.select(&ctx).unwrap().host, first);
        }
        *spread.entry(first).or_insert(0) += 1;
    }
    assert!(spread.len() >= 4, "{:?}", spread);
}

#[test]
fn test_power_of_n_avoids_busy_endpoint() {
    let eps = endpoints(3);
    let _busy: Vec<_> = (0..10).map(|_| eps[0].acquire()).collect();
    let algorithm = AlgorithmKind::PowerOfRandomNChoices.create(eps.len(), 2);
    let ctx = LbContext::new(&eps);

    let counts = counts((0..3000).map(|_| algorithm.select(&ctx).unwrap()));
    // only chosen when both draws hit it: 1/9 of the time
    let busy = counts.get(&eps[0].host).copied().unwrap_or(0);
    assert!(busy < 500, "{:?}", counts);
}

#[test]
fn test_fade_in_share_converges_to_weight_ratio() {
    let start = Instant::now();
    let now = start + Duration::from_secs(500);
    let window = Duration::from_secs(100);
    let mut eps = endpoints(2);
    eps[0].metrics = Arc::new(EndpointMetrics::detected_at(start));
    // a quarter into its window: weight 0.25, expected share 0.25 / 1.25
    eps[1].metrics = Arc::new(EndpointMetrics::detected_at(now - Duration::from_secs(25)));

    for kind in [AlgorithmKind::RoundRobin, AlgorithmKind::Random, AlgorithmKind::PowerOfRandomNChoices] {
        let algorithm = kind.create(eps.len(), 2);
        let ctx = LbContext::new(&eps)
            .with_fade_in(Some(FadeIn::new(window, 1.0)))
            .at(now);

        let counts = counts((0..10_000).map(|_| algorithm.select(&ctx).unwrap()));
        let fading = counts.get(&eps[1].host).copied().unwrap_or(0);
        assert!((1500..2500).contains(&fading), "{}: {:?}", kind, counts);
    }
}

#[test]
fn test_fade_in_endpoint_detection_survives_rebuilds() {
    use routing_engine::load_balancer::registry::EndpointRegistry;

    let registry = Arc::new(EndpointRegistry::new(Duration::from_secs(60)));
    let builder = RouteTableBuilder::new(Arc::new(FilterRegistry::new()), Arc::new(PredicateRegistry::new()))
        .with_post_processor(Arc::new(AlgorithmProvider::default()))
        .with_post_processor(registry.clone());

    let mut backend = Backend::load_balanced(&["http://10.0.0.1", "http://10.0.0.2"], "random");
    if let Backend::LoadBalanced { fade_in, .. } = &mut backend {
        *fade_in = Some(FadeIn::new(Duration::from_secs(30), 1.0));
    }
    let definition = Arc::new(RouteDefinition::new("lb", backend).with_path("/"));

    let first = builder.build(&[definition.clone()], 1);
    let second = builder.build(&[definition], 2);

    let detected = |table: &routing_engine::routing::RouteTable| {
        let lb = table.route("lb").unwrap().load_balancer.as_ref().unwrap();
        lb.endpoints.iter().map(|e| e.metrics.detected()).collect::<Vec<_>>()
    };
    assert_eq!(detected(&first), detected(&second));
    assert_eq!(registry.len(), 2);

    // in-flight counts are shared between generations
    let lb = first.route("lb").unwrap().load_balancer.as_ref().unwrap();
    let _guard = lb.endpoints[0].acquire();
    let lb = second.route("lb").unwrap().load_balancer.as_ref().unwrap();
    assert_eq!(lb.endpoints[0].metrics.inflight(), 1);

    let req = common::get("/");
    assert!(lb.select(&req, None).is_some());
}
