//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI overrides (main.rs)
//!     → DevServerConfig (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload restarts the whole process, so config is never swapped in place

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    Concurrency, DevServerConfig, MiddlewareConfig, ObservabilityConfig, ReloaderConfig, ReloaderType,
    ServerOptions, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
