//! Metrics collection.
//!
//! # Metrics
//! - `routing_table_generation` (gauge): generation of the last published table
//! - `routing_table_routes` (gauge): routes in the last table, by `state` (valid, invalid)
//! - `routing_table_build_seconds` (histogram): time to compile one table
//! - `routing_source_errors_total` (counter): failed data source calls, by `source`
//! - `lb_fallback_total` (counter): selections that fell back to random, by `algorithm`
//!
//! # Design Decisions
//! - Plain functions over the `metrics` macros so call sites stay one line
//! - Labels are low cardinality: source names and algorithm names only

use std::time::Duration;

/// Record one completed table build.
pub fn record_table_build(generation: u64, valid: usize, invalid: usize, elapsed: Duration) {
    metrics::gauge!("routing_table_generation").set(generation as f64);
    metrics::gauge!("routing_table_routes", "state" => "valid").set(valid as f64);
    metrics::gauge!("routing_table_routes", "state" => "invalid").set(invalid as f64);
    metrics::histogram!("routing_table_build_seconds").record(elapsed.as_secs_f64());
}

/// Record a failed `load_all` or `load_update` call.
pub fn record_source_error(source: &str) {
    metrics::counter!("routing_source_errors_total", "source" => source.to_string()).increment(1);
}

/// Record a load balancer falling back to a random choice.
pub fn record_lb_fallback(algorithm: &'static str) {
    metrics::counter!("lb_fallback_total", "algorithm" => algorithm).increment(1);
}
