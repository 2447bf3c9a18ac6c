//! Top-level error type returned by the server and the run loop.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::BindError;
use crate::reload::ReloaderError;

#[derive(Debug, Error)]
pub enum ServeError {
    /// TLS was requested for a Unix socket address.
    #[error("TLS is not supported on Unix sockets ({})", path.display())]
    TlsOverUnixSocket { path: PathBuf },

    #[error(transparent)]
    Bind(#[from] BindError),

    /// An application error escaped while `passthrough_errors` was set.
    #[error("application error: {0}")]
    Application(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("reloader error: {0}")]
    Reloader(#[from] ReloaderError),

    /// Loading the TLS certificate or key failed.
    #[error("failed to load TLS configuration: {0}")]
    Tls(#[source] io::Error),

    /// The reload child exited with a code other than the restart code.
    #[error("server process exited with code {0}")]
    ChildExited(i32),
}

impl ServeError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServeError::ChildExited(code) => *code,
            ServeError::Config(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let config = ServeError::from(ConfigError::Validation(Vec::new()));
        assert_eq!(config.exit_code(), 2);
        assert_eq!(ServeError::ChildExited(143).exit_code(), 143);
        assert_eq!(ServeError::Application("boom".to_string()).exit_code(), 1);
    }
}
