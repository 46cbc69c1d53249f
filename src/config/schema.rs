//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the routing engine.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::DEFAULT_POWER_OF_N_CHOICES;
use crate::routing::matcher::MatchingOptions;

/// Root configuration for the routing engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Matching and polling settings.
    pub routing: RoutingConfig,

    /// Load balancer settings.
    pub load_balancing: LoadBalancingConfig,

    /// Route sources, polled in order. Later sources win on duplicate ids.
    pub sources: Vec<SourceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Treat `/a/` and `/a` as the same path.
    pub ignore_trailing_slash: bool,

    /// Delay between two polls of a data source, and between retries after an error.
    pub poll_interval_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            ignore_trailing_slash: false,
            poll_interval_ms: 3_000,
        }
    }
}

impl RoutingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn matching_options(&self) -> MatchingOptions {
        if self.ignore_trailing_slash {
            MatchingOptions::IGNORE_TRAILING_SLASH
        } else {
            MatchingOptions::NONE
        }
    }
}

/// Load balancing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// Number of random draws for `powerOfRandomNChoices`.
    pub power_of_n_choices: usize,

    /// Endpoints absent from every table for this long are forgotten.
    pub endpoint_last_seen_timeout_secs: u64,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            power_of_n_choices: DEFAULT_POWER_OF_N_CHOICES,
            endpoint_last_seen_timeout_secs: 60,
        }
    }
}

impl LoadBalancingConfig {
    pub fn endpoint_last_seen_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint_last_seen_timeout_secs)
    }
}

/// A file data source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Name used in logs and metrics.
    pub name: String,

    /// TOML file with `[[routes]]` tables.
    pub path: PathBuf,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an `EnvFilter` string).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:9911".to_string(),
        }
    }
}
