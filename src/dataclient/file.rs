//! File data client.
//!
//! # Responsibilities
//! - Read route definitions from a TOML file of `[[routes]]` tables
//! - Report the difference to the previous read on every update poll
//!
//! # Design Decisions
//! - Unchanged file content yields an empty update without parsing
//! - A file that disappears after a successful load deletes all of its routes
//! - Parse errors leave the previously reported routes in place

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;

use crate::routing::datasource::{DataClient, DataClientError, RouteUpdate};
use crate::routing::definition::RouteDefinition;

#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<RouteDefinition>,
}

#[derive(Debug, Default)]
struct State {
    last_content: Option<String>,
    routes: HashMap<String, RouteDefinition>,
}

/// Polls a TOML route file.
#[derive(Debug)]
pub struct FileDataClient {
    name: String,
    path: PathBuf,
    state: Mutex<State>,
}

impl FileDataClient {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse(&self, content: &str) -> Result<Vec<RouteDefinition>, DataClientError> {
        toml::from_str::<RouteFile>(content)
            .map(|file| file.routes)
            .map_err(|err| DataClientError::Parse {
                path: self.path.clone(),
                reason: err.to_string(),
            })
    }

    fn io_error(&self, source: std::io::Error) -> DataClientError {
        DataClientError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DataClient for FileDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
        let read = tokio::fs::read_to_string(&self.path).await;
        let mut state = self.state();

        let content = match read {
            Ok(content) => content,
            Err(err) => {
                state.last_content = None;
                return Err(self.io_error(err));
            }
        };
        let routes = match self.parse(&content) {
            Ok(routes) => routes,
            Err(err) => {
                state.last_content = None;
                return Err(err);
            }
        };

        state.routes = routes.iter().map(|r| (r.id.clone(), r.clone())).collect();
        state.last_content = Some(content);
        Ok(routes)
    }

    async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
        let read = tokio::fs::read_to_string(&self.path).await;
        let mut state = self.state();

        let content = match read {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                state.last_content = None;
                let deleted = state.routes.drain().map(|(id, _)| id).collect();
                return Ok(RouteUpdate {
                    upserted: Vec::new(),
                    deleted,
                });
            }
            Err(err) => {
                state.last_content = None;
                return Err(self.io_error(err));
            }
        };

        if state.last_content.as_deref() == Some(content.as_str()) {
            return Ok(RouteUpdate::default());
        }

        let routes = match self.parse(&content) {
            Ok(routes) => routes,
            Err(err) => {
                state.last_content = None;
                return Err(err);
            }
        };

        let upserted: Vec<_> = routes
            .iter()
            .filter(|r| state.routes.get(&r.id) != Some(*r))
            .cloned()
            .collect();
        let next: HashMap<_, _> = routes.into_iter().map(|r| (r.id.clone(), r)).collect();
        let deleted = state
            .routes
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();

        state.routes = next;
        state.last_content = Some(content);
        Ok(RouteUpdate { upserted, deleted })
    }
}
