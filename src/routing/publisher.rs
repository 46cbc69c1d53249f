//! Route table publishing.
//!
//! # Responsibilities
//! - Rebuild the route table for every merged snapshot
//! - Hand the new table to readers atomically
//! - Let callers wait until a given table generation is live
//!
//! # Design Decisions
//! - Single writer: one loop builds and swaps, readers only `load()` from the `ArcSwap`
//! - Builds run on the blocking pool; request matching never waits on them
//! - Snapshots that arrive while a build runs are coalesced, only the latest one is built
//!
//! # Data Flow
//! ```text
//! watch<Arc<Snapshot>> → publish loop → spawn_blocking(builder.build)
//!     → ArcSwap<RouteTable>::store → watch<u64> generation
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::routing::builder::{RouteTable, RouteTableBuilder};
use crate::routing::datasource::{Snapshot, SourceAggregator};
use crate::routing::matcher::RouteMatch;

/// Read side of the routing pipeline.
///
/// Cheap to clone; every clone sees the same current table.
#[derive(Clone)]
pub struct Routing {
    table: Arc<ArcSwap<RouteTable>>,
    generation: watch::Receiver<u64>,
}

impl std::fmt::Debug for Routing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routing")
            .field("generation", &self.generation())
            .field("routes", &self.table.load().routes().len())
            .finish()
    }
}

impl Routing {
    /// Start the data sources and the publish loop.
    ///
    /// Until the first snapshot is built the table is empty and matches nothing.
    pub fn start(
        builder: RouteTableBuilder,
        sources: SourceAggregator,
        shutdown: &Shutdown,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (snapshots, mut tasks) = sources.spawn(shutdown);
        let (routing, task) = Self::start_with_snapshots(builder, snapshots, shutdown);
        tasks.push(task);
        (routing, tasks)
    }

    /// Start only the publish loop over an existing snapshot channel.
    pub fn start_with_snapshots(
        builder: RouteTableBuilder,
        snapshots: watch::Receiver<Arc<Snapshot>>,
        shutdown: &Shutdown,
    ) -> (Self, JoinHandle<()>) {
        let table = Arc::new(ArcSwap::from_pointee(RouteTable::empty()));
        let (generation_tx, generation_rx) = watch::channel(0);

        let task = tokio::spawn(publish_loop(
            builder,
            snapshots,
            table.clone(),
            generation_tx,
            shutdown.subscribe(),
        ));

        (
            Self {
                table,
                generation: generation_rx,
            },
            task,
        )
    }

    /// Match a request against the current table.
    pub fn match_request(&self, req: &Request<Body>) -> Option<RouteMatch> {
        self.table.load().match_request(req)
    }

    /// The current table.
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Generation of the current table; 0 before the first build.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Wait until a table of at least `generation` is live.
    ///
    /// Returns `None` if the publisher stopped first.
    pub async fn wait_for_generation(&self, generation: u64) -> Option<Arc<RouteTable>> {
        let mut rx = self.generation.clone();
        rx.wait_for(|current| *current >= generation).await.ok()?;
        Some(self.table())
    }
}

async fn publish_loop(
    builder: RouteTableBuilder,
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    table: Arc<ArcSwap<RouteTable>>,
    generation_tx: watch::Sender<u64>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut generation = 0;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let snapshot = snapshots.borrow_and_update().clone();
        generation += 1;

        let build = {
            let builder = builder.clone();
            tokio::task::spawn_blocking(move || builder.build(&snapshot.routes, generation))
        };
        let next = tokio::select! {
            _ = shutdown.recv() => break,
            built = build => match built {
                Ok(next) => next,
                Err(err) => {
                    tracing::error!(generation, error = %err, "route table build failed");
                    continue;
                }
            },
        };

        let valid = next.valid().len();
        let invalid = next.invalid().len();
        table.store(Arc::new(next));
        generation_tx.send_replace(generation);

        tracing::info!(generation, valid, invalid, "route table published");
    }

    tracing::debug!(generation, "publish loop stopped");
}
