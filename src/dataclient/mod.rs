//! Data clients.
//!
//! # Responsibilities
//! - Provide route definitions to the aggregator through the `DataClient` trait
//! - Report incremental changes between polls
//!
//! # Design Decisions
//! - `file`: a TOML file of `[[routes]]`, diffed against the previous read on every poll
//! - `memory`: routes held in process, for embedding and tests

pub mod file;
pub mod memory;

pub use file::FileDataClient;
pub use memory::MemoryDataClient;
