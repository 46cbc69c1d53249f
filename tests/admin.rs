//! Admin API tests, served in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use routing_engine::admin::{setup_admin_router, AdminState};
use routing_engine::lifecycle::{startup, Shutdown};
use routing_engine::load_balancer::registry::EndpointRegistry;
use routing_engine::routing::definition::RouteDefinition;
use routing_engine::routing::{Routing, Snapshot};

mod common;

const API_KEY: &str = "test-key";

/// Admin router over a published table. The sender keeps the publisher alive.
async fn setup(routes: Vec<RouteDefinition>) -> (Router, Shutdown, watch::Sender<Arc<Snapshot>>) {
    let config = common::test_config();
    let endpoints = Arc::new(EndpointRegistry::new(Duration::from_secs(60)));
    let builder = startup::table_builder(&config, endpoints.clone());

    let shutdown = Shutdown::new();
    let snapshot = Snapshot {
        version: 1,
        routes: routes.into_iter().map(Arc::new).collect(),
    };
    let (tx, rx) = watch::channel(Arc::new(Snapshot::default()));
    let (routing, _task) = Routing::start_with_snapshots(builder, rx, &shutdown);
    tx.send(Arc::new(snapshot)).unwrap();
    tokio::time::timeout(common::WAIT, routing.wait_for_generation(1))
        .await
        .unwrap()
        .unwrap();

    let router = setup_admin_router(AdminState {
        routing,
        endpoints,
        api_key: Arc::from(API_KEY),
    });
    (router, shutdown, tx)
}

async fn call(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn routes() -> Vec<RouteDefinition> {
    vec![
        common::network_route("api", "/api", "http://api.internal"),
        common::lb_route("lb", "/lb", &["http://10.0.0.1:9000", "http://10.0.0.2:9000"], "random"),
        common::network_route("bad", "/bad", "http://"),
    ]
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let (router, shutdown, _tx) = setup(routes()).await;

    let (status, _) = call(&router, "/admin/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&router, "/admin/status", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(&router, "/admin/status", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["generation"], 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_lists_routes_and_endpoints() {
    let (router, shutdown, _tx) = setup(routes()).await;

    let (status, body) = call(&router, "/admin/routes", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], serde_json::json!(["api", "lb"]));
    assert_eq!(body["invalid"][0]["id"], "bad");
    assert_eq!(body["invalid"][0]["index"], 2);
    assert!(body["invalid"][0]["error"].as_str().unwrap().contains("http://"));

    let (status, body) = call(&router, "/admin/routes/lb", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"]["load_balanced"]["algorithm"], "random");

    let (status, _) = call(&router, "/admin/routes/bad", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&router, "/admin/endpoints", Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    let endpoints: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["endpoint"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        endpoints,
        ["http://10.0.0.1:9000", "http://10.0.0.2:9000", "http://api.internal"]
    );

    shutdown.trigger();
}
