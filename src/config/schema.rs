//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the development server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DevServerConfig {
    /// `host:port` for TCP or a filesystem path for a Unix socket.
    pub address: String,

    /// Socket and connection handling.
    pub server: ServerOptions,

    /// Middleware wrapped around the application.
    pub middleware: MiddlewareConfig,

    /// Restart-on-change settings.
    pub reloader: ReloaderConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5000".to_string(),
            server: ServerOptions::default(),
            middleware: MiddlewareConfig::default(),
            reloader: ReloaderConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Options consumed by the server itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Handle each connection on its own task.
    pub threaded: bool,

    /// Maximum connections handled at once by the worker pool. `1` means
    /// sequential handling unless `threaded` is set.
    pub processes: usize,

    /// Let application errors escape and stop the server instead of turning
    /// them into a 500 response.
    pub passthrough_errors: bool,

    /// TLS certificate and key. TCP addresses only.
    pub tls: Option<TlsConfig>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            threaded: false,
            processes: 1,
            passthrough_errors: false,
            tls: None,
        }
    }
}

impl ServerOptions {
    /// How accepted connections are dispatched.
    pub fn concurrency(&self) -> Concurrency {
        if self.threaded {
            Concurrency::Threaded
        } else if self.processes > 1 {
            Concurrency::Pool(self.processes)
        } else {
            Concurrency::Sequential
        }
    }
}

/// Connection dispatch mode. The three modes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One connection at a time, inside the accept loop.
    Sequential,
    /// One task per connection, unbounded.
    Threaded,
    /// One task per connection, at most `n` in flight.
    Pool(usize),
}

impl Concurrency {
    pub fn is_multithread(&self) -> bool {
        matches!(self, Concurrency::Threaded)
    }

    pub fn is_multiprocess(&self) -> bool {
        matches!(self, Concurrency::Pool(_))
    }
}

/// TLS configuration for TCP listeners.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Middleware selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Catch application errors and render them as an HTML error page.
    pub use_debugger: bool,

    /// URL prefix → directory served before the application sees the request.
    pub static_files: BTreeMap<String, PathBuf>,
}

/// How the reloader notices file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloaderType {
    /// OS file-change notifications.
    #[default]
    Notify,
    /// Periodic stat polling.
    Poll,
}

/// Reloader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloaderConfig {
    /// Restart the server when a watched file changes.
    pub enabled: bool,

    /// Polling interval in milliseconds.
    pub interval_ms: u64,

    /// Change detection backend.
    pub kind: ReloaderType,

    /// Files or directories watched in addition to the running executable.
    pub extra_files: Vec<PathBuf>,
}

impl Default for ReloaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 1000,
            kind: ReloaderType::Notify,
            extra_files: Vec::new(),
        }
    }
}

impl ReloaderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_modes() {
        let mut options = ServerOptions::default();
        assert_eq!(options.concurrency(), Concurrency::Sequential);

        options.threaded = true;
        assert_eq!(options.concurrency(), Concurrency::Threaded);
        assert!(options.concurrency().is_multithread());

        options.threaded = false;
        options.processes = 4;
        assert_eq!(options.concurrency(), Concurrency::Pool(4));
        assert!(options.concurrency().is_multiprocess());
    }

    #[test]
    fn minimal_document_uses_defaults() {
        let config: DevServerConfig = toml::from_str(r#"address = "/tmp/app.sock""#).unwrap();
        assert_eq!(config.address, "/tmp/app.sock");
        assert_eq!(config.server.processes, 1);
        assert!(!config.reloader.enabled);
        assert_eq!(config.reloader.kind, ReloaderType::Notify);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn full_document_parses() {
        let config: DevServerConfig = toml::from_str(
            r#"
            address = "0.0.0.0:8443"

            [server]
            threaded = true
            passthrough_errors = true

            [server.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [middleware]
            use_debugger = true
            static_files = { "/static" = "public" }

            [reloader]
            enabled = true
            interval_ms = 250
            kind = "poll"
            extra_files = ["templates"]
            "#,
        )
        .unwrap();

        assert!(config.server.threaded);
        assert_eq!(config.server.tls.unwrap().cert_path, PathBuf::from("cert.pem"));
        assert_eq!(
            config.middleware.static_files.get("/static"),
            Some(&PathBuf::from("public"))
        );
        assert_eq!(config.reloader.kind, ReloaderType::Poll);
        assert_eq!(config.reloader.interval(), Duration::from_millis(250));
    }
}
