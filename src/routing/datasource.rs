//! Data source aggregation.
//!
//! # Responsibilities
//! - Poll every configured data client on its own task
//! - Keep the per-source route set current (full loads and incremental updates)
//! - Merge all sources into one snapshot after every change
//!
//! # Design Decisions
//! - A source starts with `load_all` and retries it until it succeeds, then polls
//!   `load_update`; a failed update puts the source back into initial mode after
//!   one poll interval
//! - Sources listed later win on duplicate ids
//! - Snapshot order is deterministic: source position, then first insertion into the source
//! - Snapshots are published on a watch channel; a slow consumer only sees the latest one
//!
//! # Data Flow
//! ```text
//! DataClient[i] ── receive task ──┐
//! DataClient[j] ── receive task ──┼─▶ mpsc ─▶ merge loop ─▶ watch<Arc<Snapshot>>
//! DataClient[k] ── receive task ──┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::definition::RouteDefinition;

/// Error returned by a data client call.
#[derive(Debug, Error)]
pub enum DataClientError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Incremental change reported by `load_update`.
#[derive(Debug, Clone, Default)]
pub struct RouteUpdate {
    pub upserted: Vec<RouteDefinition>,
    pub deleted: Vec<String>,
}

impl RouteUpdate {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }
}

/// A source of route definitions.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Every route the source currently holds.
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError>;

    /// Changes since the previous `load_all` or `load_update`.
    async fn load_update(&self) -> Result<RouteUpdate, DataClientError>;
}

/// Merged route set of all sources.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Increases with every merge.
    pub version: u64,
    pub routes: Vec<Arc<RouteDefinition>>,
}

#[derive(Debug)]
enum Incoming {
    Reset(Vec<RouteDefinition>),
    Update(RouteUpdate),
}

/// Current routes of one source, with their insertion sequence.
#[derive(Debug, Default)]
struct SourceRoutes {
    entries: HashMap<String, (u64, Arc<RouteDefinition>)>,
    next_seq: u64,
}

impl SourceRoutes {
    fn apply(&mut self, incoming: Incoming) {
        let upserted = match incoming {
            Incoming::Reset(routes) => {
                self.entries.clear();
                self.next_seq = 0;
                routes
            }
            Incoming::Update(update) => {
                for id in &update.deleted {
                    self.entries.remove(id);
                }
                update.upserted
            }
        };

        for route in upserted {
            let route = Arc::new(route);
            match self.entries.get_mut(&route.id) {
                Some(entry) => entry.1 = route,
                None => {
                    self.entries.insert(route.id.clone(), (self.next_seq, route));
                    self.next_seq += 1;
                }
            }
        }
    }
}

fn merge(sources: &[SourceRoutes]) -> Vec<Arc<RouteDefinition>> {
    let mut merged: HashMap<&str, (usize, u64, &Arc<RouteDefinition>)> = HashMap::new();
    for (index, source) in sources.iter().enumerate() {
        for (id, (seq, route)) in &source.entries {
            merged.insert(id.as_str(), (index, *seq, route));
        }
    }

    let mut ordered: Vec<_> = merged.into_values().collect();
    ordered.sort_by_key(|(index, seq, _)| (*index, *seq));
    ordered.into_iter().map(|(_, _, route)| route.clone()).collect()
}

/// Merge full loads of every source, in source order, the way the aggregator
/// merges them: later sources win on duplicate ids.
pub fn merge_loaded(sources: Vec<Vec<RouteDefinition>>) -> Vec<Arc<RouteDefinition>> {
    let sources: Vec<SourceRoutes> = sources
        .into_iter()
        .map(|routes| {
            let mut source = SourceRoutes::default();
            source.apply(Incoming::Reset(routes));
            source
        })
        .collect();
    merge(&sources)
}

/// Polls a set of data clients and publishes merged snapshots.
pub struct SourceAggregator {
    clients: Vec<Arc<dyn DataClient>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for SourceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAggregator")
            .field("clients", &self.clients.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl SourceAggregator {
    pub fn new(clients: Vec<Arc<dyn DataClient>>, poll_interval: Duration) -> Self {
        Self {
            clients,
            poll_interval,
        }
    }

    /// Start one receive task per client and the merge loop.
    ///
    /// The returned receiver holds an empty version 0 snapshot until the first source reports.
    pub fn spawn(self, shutdown: &Shutdown) -> (watch::Receiver<Arc<Snapshot>>, Vec<JoinHandle<()>>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::default()));
        let (incoming_tx, incoming_rx) = mpsc::channel(self.clients.len().max(1));

        let mut tasks = Vec::with_capacity(self.clients.len() + 1);
        for (index, client) in self.clients.iter().enumerate() {
            tasks.push(tokio::spawn(receive_from_client(
                index,
                client.clone(),
                self.poll_interval,
                incoming_tx.clone(),
                shutdown.subscribe(),
            )));
        }
        drop(incoming_tx);

        tasks.push(tokio::spawn(merge_loop(
            self.clients.len(),
            incoming_rx,
            snapshot_tx,
            shutdown.subscribe(),
        )));

        tracing::info!(
            sources = self.clients.len(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "data sources started"
        );
        (snapshot_rx, tasks)
    }
}

/// Sleep for `duration`. Returns `false` on shutdown.
async fn pause(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Forward to the merge loop. Returns `false` on shutdown or when the loop is gone.
async fn forward(
    tx: &mpsc::Sender<(usize, Incoming)>,
    message: (usize, Incoming),
    shutdown: &mut broadcast::Receiver<()>,
) -> bool {
    tokio::select! {
        _ = shutdown.recv() => false,
        sent = tx.send(message) => sent.is_ok(),
    }
}

async fn receive_from_client(
    index: usize,
    client: Arc<dyn DataClient>,
    poll_interval: Duration,
    tx: mpsc::Sender<(usize, Incoming)>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let name = client.name().to_string();

    loop {
        let routes = loop {
            let result = tokio::select! {
                _ = shutdown.recv() => return,
                result = client.load_all() => result,
            };
            match result {
                Ok(routes) => break routes,
                Err(err) => {
                    tracing::error!(source = %name, error = %err, "failed to load routes");
                    metrics::record_source_error(&name);
                    if !pause(poll_interval, &mut shutdown).await {
                        return;
                    }
                }
            }
        };

        tracing::info!(source = %name, routes = routes.len(), "routes loaded");
        if !forward(&tx, (index, Incoming::Reset(routes)), &mut shutdown).await {
            return;
        }

        loop {
            if !pause(poll_interval, &mut shutdown).await {
                return;
            }
            let result = tokio::select! {
                _ = shutdown.recv() => return,
                result = client.load_update() => result,
            };
            let update = match result {
                Ok(update) => update,
                Err(err) => {
                    tracing::error!(source = %name, error = %err, "failed to load route update, reloading");
                    metrics::record_source_error(&name);
                    if !pause(poll_interval, &mut shutdown).await {
                        return;
                    }
                    break;
                }
            };
            if update.is_empty() {
                continue;
            }

            tracing::debug!(
                source = %name,
                upserted = update.upserted.len(),
                deleted = update.deleted.len(),
                "route update received"
            );
            if !forward(&tx, (index, Incoming::Update(update)), &mut shutdown).await {
                return;
            }
        }
    }
}

async fn merge_loop(
    source_count: usize,
    mut rx: mpsc::Receiver<(usize, Incoming)>,
    tx: watch::Sender<Arc<Snapshot>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut sources: Vec<SourceRoutes> = (0..source_count).map(|_| SourceRoutes::default()).collect();
    let mut version = 0;

    loop {
        let (index, incoming) = tokio::select! {
            _ = shutdown.recv() => break,
            received = rx.recv() => match received {
                Some(received) => received,
                None => break,
            },
        };
        let Some(source) = sources.get_mut(index) else {
            continue;
        };
        source.apply(incoming);

        version += 1;
        let routes = merge(&sources);
        tracing::debug!(version, routes = routes.len(), "route snapshot merged");
        if tx.send(Arc::new(Snapshot { version, routes })).is_err() {
            break;
        }
    }

    tracing::debug!("merge loop stopped");
}
