//! Metrics collection.
//!
//! # Metrics
//! - `devserve_connections_total` (counter): accepted connections by family
//! - `devserve_accept_errors_total` (counter): failed accepts by kind
//! - `devserve_requests_total` (counter): requests by method and status
//! - `devserve_request_duration_seconds` (histogram): time spent in the application
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the embedding program picks
//!   the exporter
//! - Labels stay low-cardinality (no paths)

use std::time::Instant;

use metrics::{counter, histogram};

use crate::net::AddressFamily;

/// Count one accepted connection.
pub fn record_connection(family: AddressFamily) {
    counter!("devserve_connections_total", "family" => family.as_str()).increment(1);
}

/// Count one failed accept, `transient` or `fatal`.
pub fn record_accept_error(kind: &'static str) {
    counter!("devserve_accept_errors_total", "kind" => kind).increment(1);
}

/// Count one finished request and its duration.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    let duration = start_time.elapsed().as_secs_f64();

    counter!(
        "devserve_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "devserve_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(duration);
}
