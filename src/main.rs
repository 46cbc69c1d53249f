//! Routing engine binary.
//!
//! Loads a TOML config, polls the configured route files and keeps the route table
//! current until SIGINT or SIGTERM. The admin API exposes the live table.
//!
//! ```text
//! route files ──▶ data sources ──▶ table builder ──▶ published table ──▶ admin API
//!                                      │
//!                          algorithm provider, endpoint registry
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use routing_engine::config::load_config;
use routing_engine::lifecycle::{signals, startup, Shutdown};
use routing_engine::load_balancer::registry::EndpointRegistry;
use routing_engine::observability::logging::init_logging;
use routing_engine::routing::merge_loaded;
use routing_engine::EngineConfig;

#[derive(Parser)]
#[command(name = "routing-engine")]
#[command(about = "Hot-reloading HTTP route table engine", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "routing-engine.toml")]
    config: PathBuf,

    /// Validate the config and every route source once, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "routing-engine starting"
    );

    if cli.check {
        return check(&config).await;
    }

    let shutdown = Shutdown::new();
    let engine = startup::start(&config, shutdown.clone()).await?;
    if let Some(addr) = engine.admin_addr() {
        tracing::info!(address = %addr, "admin API enabled");
    }

    signals::trigger_on_signal(shutdown);
    engine.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load every source once and compile a table, reporting invalid routes.
async fn check(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut loaded = Vec::new();
    for client in startup::data_clients(config) {
        let routes = client.load_all().await?;
        println!("{}: {} routes", client.name(), routes.len());
        loaded.push(routes);
    }
    let definitions = merge_loaded(loaded);

    let endpoints = Arc::new(EndpointRegistry::new(
        config.load_balancing.endpoint_last_seen_timeout(),
    ));
    let table = startup::table_builder(config, endpoints).build(&definitions, 1);
    for invalid in table.invalid() {
        println!("invalid route {}", invalid);
    }
    println!("{} valid, {} invalid", table.valid().len(), table.invalid().len());

    if table.invalid().is_empty() {
        Ok(())
    } else {
        Err(format!("{} invalid routes", table.invalid().len()).into())
    }
}
