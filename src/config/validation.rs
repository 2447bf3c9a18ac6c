//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject combined concurrency modes
//! - Check static-file prefixes and reloader ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - TLS over a Unix socket is rejected by the server at bind time, where the
//!   address has been resolved

use thiserror::Error;

use crate::config::schema::DevServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("threaded and multi-process modes are mutually exclusive")]
    ConflictingConcurrency,

    #[error("server.processes must be at least 1")]
    ZeroProcesses,

    #[error("static file prefix {0:?} must start with '/'")]
    StaticPrefix(String),

    #[error("reloader.interval_ms must be greater than 0")]
    ZeroReloadInterval,

    #[error("TLS {0} path is empty")]
    EmptyTlsPath(&'static str),
}

/// Check a configuration, returning every problem found.
pub fn validate_config(config: &DevServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.processes == 0 {
        errors.push(ValidationError::ZeroProcesses);
    }
    if config.server.threaded && config.server.processes > 1 {
        errors.push(ValidationError::ConflictingConcurrency);
    }

    if let Some(tls) = &config.server.tls {
        if tls.cert_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("certificate"));
        }
        if tls.key_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key"));
        }
    }

    for prefix in config.middleware.static_files.keys() {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::StaticPrefix(prefix.clone()));
        }
    }

    if config.reloader.enabled && config.reloader.interval_ms == 0 {
        errors.push(ValidationError::ZeroReloadInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
