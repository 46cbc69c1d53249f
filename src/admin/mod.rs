//! Read-only admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, current generation, route counts
//! - `GET /admin/routes`: valid route ids and invalid routes with their errors
//! - `GET /admin/routes/{id}`: the definition behind a valid route
//! - `GET /admin/endpoints`: endpoint registry contents
//!
//! # Design Decisions
//! - Every endpoint requires `Authorization: Bearer <api_key>`
//! - Handlers read the current table once per request and never block the publisher

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::lifecycle::Shutdown;
use crate::load_balancer::registry::EndpointRegistry;
use crate::routing::Routing;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState {
    pub routing: Routing,
    pub endpoints: Arc<EndpointRegistry>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/routes/{id}", get(get_route))
        .route("/admin/endpoints", get(get_endpoints))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve(listener: TcpListener, router: Router, shutdown: Shutdown) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "admin API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!("admin API stopped");
    Ok(())
}
