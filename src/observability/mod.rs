//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stderr through the `fmt` subscriber
//!     → whatever recorder the embedding program installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the environ into every access-log line
//! - No exporter is installed here; without a recorder the macros are no-ops
//! - Log filter from config, `RUST_LOG` wins when set

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
