use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::load_balancer::registry::EndpointSnapshot;
use crate::routing::definition::RouteDefinition;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub valid_routes: usize,
    pub invalid_routes: usize,
}

#[derive(Debug, Serialize)]
pub struct InvalidRouteStatus {
    pub id: String,
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RouteTableStatus {
    pub generation: u64,
    /// Unix timestamp of the table build, in seconds.
    pub created: u64,
    pub valid: Vec<String>,
    pub invalid: Vec<InvalidRouteStatus>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.routing.table();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if table.generation() > 0 { "operational" } else { "starting" },
        generation: table.generation(),
        valid_routes: table.valid().len(),
        invalid_routes: table.invalid().len(),
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<RouteTableStatus> {
    let table = state.routing.table();
    Json(RouteTableStatus {
        generation: table.generation(),
        created: table
            .created()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        valid: table.valid().iter().map(|d| d.id.clone()).collect(),
        invalid: table
            .invalid()
            .iter()
            .map(|r| InvalidRouteStatus {
                id: r.id.clone(),
                index: r.index,
                error: r.error.to_string(),
            })
            .collect(),
    })
}

pub async fn get_route(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<RouteDefinition>, StatusCode> {
    let table = state.routing.table();
    table
        .route(&id)
        .map(|route| Json(route.definition.as_ref().clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<EndpointSnapshot>> {
    Json(state.endpoints.snapshot())
}
