//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use routing_engine::routing::builder::RouteTable;
use routing_engine::routing::definition::{Backend, RouteDefinition};
use routing_engine::routing::Routing;
use routing_engine::EngineConfig;

/// Upper bound for anything the pipeline does in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// A config polling fast enough for tests.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.routing.poll_interval_ms = 20;
    config
}

pub fn network_route(id: &str, path: &str, backend: &str) -> RouteDefinition {
    RouteDefinition::new(id, Backend::network(backend)).with_path(path)
}

pub fn lb_route(id: &str, path: &str, endpoints: &[&str], algorithm: &str) -> RouteDefinition {
    RouteDefinition::new(id, Backend::load_balanced(endpoints, algorithm)).with_path(path)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn write_routes(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

/// Wait until the published table satisfies `condition`.
pub async fn wait_for_table<F>(routing: &Routing, condition: F) -> Arc<RouteTable>
where
    F: Fn(&RouteTable) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let table = routing.table();
            if condition(&table) {
                return table;
            }
            let next = table.generation() + 1;
            routing
                .wait_for_generation(next)
                .await
                .expect("publisher stopped");
        }
    })
    .await
    .expect("route table did not reach the expected state")
}

/// Route id matched for `uri`, if any.
pub fn matched_id(routing: &Routing, uri: &str) -> Option<String> {
    routing.match_request(&get(uri)).map(|m| m.route.id.clone())
}
