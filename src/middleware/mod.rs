//! Development middleware.
//!
//! # Layering
//! ```text
//! Debugger (outermost, sees every failure)
//!     → SharedData (static files)
//!         → application
//! ```

pub mod debugger;
pub mod shared_data;

use std::sync::Arc;

use crate::app::SharedApp;
use crate::config::MiddlewareConfig;

pub use debugger::Debugger;
pub use shared_data::SharedData;

/// Wrap `app` in the middleware `config` enables.
///
/// Static files are applied first and the debugger last, so the debugger
/// also catches failures raised while serving static files.
pub fn wrap_application(app: SharedApp, config: &MiddlewareConfig) -> SharedApp {
    let mut app = app;

    if !config.static_files.is_empty() {
        tracing::debug!(mounts = config.static_files.len(), "Enabling static files");
        app = Arc::new(SharedData::new(app, config.static_files.clone()));
    }

    if config.use_debugger {
        tracing::debug!("Enabling debugger");
        app = Arc::new(Debugger::new(app));
    }

    app
}
