//! In-memory data client.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::routing::datasource::{DataClient, DataClientError, RouteUpdate};
use crate::routing::definition::RouteDefinition;

#[derive(Debug, Default)]
struct State {
    routes: Vec<RouteDefinition>,
    pending: RouteUpdate,
    failures: usize,
}

/// Routes held in process. Changes are reported on the next `load_update`.
#[derive(Debug)]
pub struct MemoryDataClient {
    name: String,
    state: Mutex<State>,
}

impl MemoryDataClient {
    pub fn new(name: impl Into<String>, routes: Vec<RouteDefinition>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State {
                routes,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a route.
    pub fn upsert(&self, route: RouteDefinition) {
        let mut state = self.state();
        match state.routes.iter_mut().find(|r| r.id == route.id) {
            Some(existing) => *existing = route.clone(),
            None => state.routes.push(route.clone()),
        }
        state.pending.deleted.retain(|id| *id != route.id);
        state.pending.upserted.retain(|r| r.id != route.id);
        state.pending.upserted.push(route);
    }

    /// Remove a route by id.
    pub fn delete(&self, id: &str) {
        let mut state = self.state();
        state.routes.retain(|r| r.id != id);
        state.pending.upserted.retain(|r| r.id != id);
        state.pending.deleted.push(id.to_string());
    }

    /// Make the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state().failures = count;
    }

    fn check_failure(state: &mut State) -> Result<(), DataClientError> {
        if state.failures > 0 {
            state.failures -= 1;
            return Err(DataClientError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataClient for MemoryDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
        let mut state = self.state();
        Self::check_failure(&mut state)?;
        state.pending = RouteUpdate::default();
        Ok(state.routes.clone())
    }

    async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
        let mut state = self.state();
        Self::check_failure(&mut state)?;
        Ok(std::mem::take(&mut state.pending))
    }
}
