//! End-to-end tests of the route pipeline: file sources, merging, building and publishing.

use std::sync::Arc;

use routing_engine::config::schema::SourceConfig;
use routing_engine::dataclient::MemoryDataClient;
use routing_engine::lifecycle::{startup, Shutdown};
use routing_engine::routing::definition::Backend;
use routing_engine::routing::error::DefinitionError;
use routing_engine::routing::DataClient;

mod common;

use common::{matched_id, network_route, test_config, wait_for_table, write_routes};

const BASE_ROUTES: &str = r#"
[[routes]]
id = "users"
path = "/users/:id"
backend = { network = "http://users.internal:8080" }

[[routes]]
id = "shared"
path = "/shared"
backend = { network = "http://base.internal" }

[[routes]]
id = "broken"
path = "/broken"
backend = { network = "not a url" }
"#;

const OVERRIDE_ROUTES: &str = r#"
[[routes]]
id = "shared"
path = "/shared"
backend = { network = "http://override.internal" }

[[routes]]
id = "assets"
predicates = [{ name = "PathSubtree", args = ["/assets"] }]
backend = "shunt"
"#;

#[tokio::test]
async fn test_file_sources_are_merged_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.toml");
    let overrides = dir.path().join("override.toml");
    write_routes(&base, BASE_ROUTES);
    write_routes(&overrides, OVERRIDE_ROUTES);

    let mut config = test_config();
    config.sources = vec![
        SourceConfig {
            name: "base".into(),
            path: base.clone(),
        },
        SourceConfig {
            name: "override".into(),
            path: overrides.clone(),
        },
    ];

    let engine = startup::start(&config, Shutdown::new()).await.unwrap();
    let routing = engine.routing.clone();

    let table = wait_for_table(&routing, |t| t.valid().len() == 3).await;
    let valid: Vec<_> = table.valid().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(valid, ["users", "shared", "assets"]);
    assert_eq!(table.invalid().len(), 1);
    assert_eq!(table.invalid()[0].id, "broken");
    assert!(matches!(table.invalid()[0].error, DefinitionError::InvalidBackend { .. }));

    let shared = table.route("shared").unwrap();
    assert_eq!(shared.host, "override.internal");

    let users = routing.match_request(&common::get("/users/42")).unwrap();
    assert_eq!(users.route.id, "users");
    assert_eq!(users.params.get("id"), Some("42"));
    assert_eq!(matched_id(&routing, "/assets"), Some("assets".into()));
    assert_eq!(matched_id(&routing, "/assets/css/site.css"), Some("assets".into()));
    assert_eq!(matched_id(&routing, "/broken"), None);

    // drop the override file: its routes disappear and the base route shows through
    std::fs::remove_file(&overrides).unwrap();
    let table = wait_for_table(&routing, |t| t.route("assets").is_none()).await;
    assert_eq!(table.route("shared").unwrap().host, "base.internal");

    write_routes(
        &base,
        r#"
        [[routes]]
        id = "users"
        path = "/v2/users/:id"
        backend = { network = "http://users.internal:8080" }
        "#,
    );
    wait_for_table(&routing, |t| t.valid().len() == 1 && t.invalid().is_empty()).await;
    assert_eq!(matched_id(&routing, "/users/42"), None);
    assert_eq!(matched_id(&routing, "/v2/users/42"), Some("users".into()));

    engine.stop().await;
}

#[tokio::test]
async fn test_failing_source_does_not_block_others() {
    let healthy = Arc::new(MemoryDataClient::new(
        "healthy",
        vec![network_route("a", "/a", "http://a.internal")],
    ));
    let flaky = Arc::new(MemoryDataClient::new(
        "flaky",
        vec![network_route("b", "/b", "http://b.internal")],
    ));
    flaky.fail_next(3);

    let clients: Vec<Arc<dyn DataClient>> = vec![healthy.clone(), flaky.clone()];
    let engine = startup::start_with_clients(&test_config(), clients, Shutdown::new())
        .await
        .unwrap();
    let routing = engine.routing.clone();

    wait_for_table(&routing, |t| t.route("a").is_some()).await;
    wait_for_table(&routing, |t| t.route("a").is_some() && t.route("b").is_some()).await;

    // a failed update reloads the whole source
    flaky.fail_next(1);
    flaky.upsert(network_route("c", "/c", "http://c.internal"));
    wait_for_table(&routing, |t| t.route("c").is_some()).await;
    assert_eq!(matched_id(&routing, "/b"), Some("b".into()));

    healthy.delete("a");
    wait_for_table(&routing, |t| t.route("a").is_none()).await;
    assert_eq!(matched_id(&routing, "/a"), None);

    engine.stop().await;
}

#[tokio::test]
async fn test_load_balanced_routes_are_provisioned() {
    let client = Arc::new(MemoryDataClient::new(
        "memory",
        vec![
            common::lb_route("lb", "/lb", &["http://10.0.0.1:8080", "http://10.0.0.2:8080"], "roundRobin"),
            common::lb_route("empty", "/empty", &[], "random"),
            common::lb_route("unknown", "/unknown", &["http://10.0.0.3"], "leastLatency"),
        ],
    ));

    let clients: Vec<Arc<dyn DataClient>> = vec![client];
    let engine = startup::start_with_clients(&test_config(), clients, Shutdown::new())
        .await
        .unwrap();

    let table = wait_for_table(&engine.routing, |t| t.generation() > 0).await;
    let valid: Vec<_> = table.valid().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(valid, ["lb"]);
    assert_eq!(table.invalid()[0].error, DefinitionError::NoEndpoints);
    assert_eq!(
        table.invalid()[1].error,
        DefinitionError::UnknownAlgorithm("leastLatency".into())
    );

    let matched = engine.routing.match_request(&common::get("/lb")).unwrap();
    let lb = matched.route.load_balancer.as_ref().unwrap();
    let first = lb.select(&common::get("/lb"), None).unwrap().host.clone();
    let second = lb.select(&common::get("/lb"), None).unwrap().host.clone();
    assert_ne!(first, second);

    // every endpoint of the table is tracked
    let tracked: Vec<_> = engine.endpoints.snapshot().into_iter().map(|e| e.endpoint).collect();
    assert_eq!(tracked, ["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);

    assert!(matches!(
        table.route("lb").unwrap().definition.backend,
        Backend::LoadBalanced { .. }
    ));
    engine.stop().await;
}
