//! Restart-on-change support.
//!
//! # Data Flow
//! ```text
//! main process (ReloaderRole::Main)
//!     → pre-flight bind probe
//!     → supervisor.rs: spawn self with DEVSERVE_RUN_MAIN=true, wait
//!         exit code 3 → spawn again
//!         anything else → return that code
//!
//! child process (ReloaderRole::Child)
//!     → watcher.rs: watch the executable and extra files
//!     → bind and serve
//!     → change detected: shut the server down, exit with code 3
//! ```
//!
//! # Design Decisions
//! - The role comes from the environment, never from shared state
//! - The child rebinds the address itself; the parent only checks it is free
//! - Watching is per file through the parent directory, so editors that
//!   replace files by rename are still seen

pub mod supervisor;
pub mod watcher;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use supervisor::Supervisor;
pub use watcher::{watched_paths, FileWatcher};

/// Environment variable marking a process as the reload child.
pub const RELOADER_ENV: &str = "DEVSERVE_RUN_MAIN";

/// Exit code a child uses to ask the supervisor for a restart.
pub const EXIT_RESTART: i32 = 3;

/// Which side of the reloader this process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloaderRole {
    /// Started by the user. Prints the banner and supervises.
    Main,
    /// Started by the supervisor. Serves and watches files.
    Child,
}

impl ReloaderRole {
    /// Detect the role from [`RELOADER_ENV`].
    pub fn from_env() -> Self {
        Self::from_marker(std::env::var(RELOADER_ENV).ok().as_deref())
    }

    fn from_marker(value: Option<&str>) -> Self {
        match value {
            Some("true") => ReloaderRole::Child,
            _ => ReloaderRole::Main,
        }
    }

    pub fn is_main(&self) -> bool {
        *self == ReloaderRole::Main
    }
}

#[derive(Debug, Error)]
pub enum ReloaderError {
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for the server process: {0}")]
    Wait(#[source] io::Error),

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
}
