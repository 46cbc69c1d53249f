//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the filter and predicate registries
//! - Create the data clients named in the config
//! - Start the routing pipeline and, if enabled, the admin API
//!
//! # Design Decisions
//! - Only binding the admin listener can fail; sources that are down are retried in the background
//! - Subsystems initialize in order, not concurrently
//! - The admin listener is bound before any task is spawned

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::EngineConfig;
use crate::dataclient::FileDataClient;
use crate::filters::builtin_filters;
use crate::lifecycle::Shutdown;
use crate::load_balancer::provider::AlgorithmProvider;
use crate::load_balancer::registry::EndpointRegistry;
use crate::predicates::builtin_predicates;
use crate::routing::{DataClient, RouteTableBuilder, Routing, SourceAggregator};

/// Error type for engine startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind admin API on {address}: {source}")]
    AdminBind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A running routing engine.
#[derive(Debug)]
pub struct Engine {
    pub routing: Routing,
    pub endpoints: Arc<EndpointRegistry>,
    admin_addr: Option<SocketAddr>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Address the admin API listens on, if enabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    /// Trigger shutdown and wait for every task.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.join().await;
    }

    /// Wait for every task; returns after an external shutdown trigger.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "engine task failed");
            }
        }
        tracing::info!("routing engine stopped");
    }
}

/// Table builder with the builtin registries and both post-processors.
pub fn table_builder(config: &EngineConfig, endpoints: Arc<EndpointRegistry>) -> RouteTableBuilder {
    RouteTableBuilder::new(Arc::new(builtin_filters()), Arc::new(builtin_predicates()))
        .with_options(config.routing.matching_options())
        .with_post_processor(Arc::new(AlgorithmProvider::new(config.load_balancing.power_of_n_choices)))
        .with_post_processor(endpoints)
}

/// One file data client per configured source.
pub fn data_clients(config: &EngineConfig) -> Vec<Arc<dyn DataClient>> {
    config
        .sources
        .iter()
        .map(|source| Arc::new(FileDataClient::new(&source.name, &source.path)) as Arc<dyn DataClient>)
        .collect()
}

/// Start the engine with the data clients named in the config.
pub async fn start(config: &EngineConfig, shutdown: Shutdown) -> Result<Engine, StartupError> {
    start_with_clients(config, data_clients(config), shutdown).await
}

/// Start the engine with the given data clients.
pub async fn start_with_clients(
    config: &EngineConfig,
    clients: Vec<Arc<dyn DataClient>>,
    shutdown: Shutdown,
) -> Result<Engine, StartupError> {
    let endpoints = Arc::new(EndpointRegistry::new(
        config.load_balancing.endpoint_last_seen_timeout(),
    ));
    let builder = table_builder(config, endpoints.clone());
    tracing::debug!(?builder, "route table builder ready");

    let admin_listener = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::AdminBind {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        Some(listener)
    } else {
        None
    };

    let sources = SourceAggregator::new(clients, config.routing.poll_interval());
    let (routing, mut tasks) = Routing::start(builder, sources, &shutdown);

    let mut admin_addr = None;
    if let Some(listener) = admin_listener {
        admin_addr = listener.local_addr().ok();

        let router = admin::setup_admin_router(AdminState {
            routing: routing.clone(),
            endpoints: endpoints.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let admin_shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = admin::serve(listener, router, admin_shutdown).await {
                tracing::error!(error = %err, "admin API failed");
            }
        }));
    }

    tracing::info!(
        sources = config.sources.len(),
        admin = config.admin.enabled,
        "routing engine started"
    );

    Ok(Engine {
        routing,
        endpoints,
        admin_addr,
        shutdown,
        tasks,
    })
}
