//! Top-level run loop.
//!
//! # Responsibilities
//! - Resolve the address and wrap the application in middleware
//! - Announce the server once, from the main process
//! - Serve directly, or supervise a reloading child
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before serving starts
//! - A reload child exits the process with the restart code itself, after the
//!   server has shut down and released its socket path

use crate::app::SharedApp;
use crate::config::{DevServerConfig, ServerOptions};
use crate::error::ServeError;
use crate::http::Server;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::middleware::wrap_application;
use crate::net::{resolve, Address, Listener};
use crate::reload::{watched_paths, FileWatcher, ReloaderRole, Supervisor, EXIT_RESTART};

/// Run a development server for `app` on `address` until it is stopped.
///
/// `address` is a `host:port` pair or a Unix socket path. With the reloader
/// enabled in `config`, the calling process becomes a supervisor and the
/// server runs in a child copy of the program.
pub async fn run_simple(address: &str, app: SharedApp, config: DevServerConfig) -> Result<(), ServeError> {
    let address = resolve(address);
    let role = ReloaderRole::from_env();
    check_transport(&address, &config.server)?;

    let app = wrap_application(app, &config.middleware);

    if role.is_main() {
        announce(&address, &config);
    }

    if !config.reloader.enabled {
        return serve(address, app, config.server).await;
    }

    match role {
        ReloaderRole::Main => supervise(&address).await,
        ReloaderRole::Child => serve_with_reload(address, app, config).await,
    }
}

fn check_transport(address: &Address, options: &ServerOptions) -> Result<(), ServeError> {
    match (address, &options.tls) {
        (Address::Unix { path }, Some(_)) => Err(ServeError::TlsOverUnixSocket { path: path.clone() }),
        _ => Ok(()),
    }
}

fn announce(address: &Address, config: &DevServerConfig) {
    let url = match (&config.server.tls, address) {
        (Some(_), Address::Tcp { .. }) => address.url().replacen("http://", "https://", 1),
        _ => address.url(),
    };
    tracing::info!(" * Running on {url} (Press CTRL+C to quit)");
    if config.middleware.use_debugger {
        tracing::info!(" * Debugger is active");
    }
}

async fn serve(address: Address, app: SharedApp, options: ServerOptions) -> Result<(), ServeError> {
    let server = Server::bind(address, app, options).await?;
    let signals = spawn_signal_handler(server.shutdown_handle());
    let result = server.serve_forever().await;
    signals.abort();
    result
}

async fn supervise(address: &Address) -> Result<(), ServeError> {
    // Surface bind errors here rather than in a restarting child.
    Listener::probe(address).await?;

    let supervisor = Supervisor::from_current_process()?;
    tracing::info!(" * Restarting with reloader");
    match supervisor.run().await? {
        0 => Ok(()),
        code => Err(ServeError::ChildExited(code)),
    }
}

async fn serve_with_reload(address: Address, app: SharedApp, config: DevServerConfig) -> Result<(), ServeError> {
    let paths = watched_paths(&config.reloader.extra_files)?;
    let mut watcher = FileWatcher::start(&paths, config.reloader.kind, config.reloader.interval())?;

    let server = Server::bind(address, app, config.server).await?;
    let shutdown = server.shutdown_handle();
    let signals = spawn_signal_handler(shutdown.clone());

    let serving = server.serve_forever();
    tokio::pin!(serving);

    let mut restart = false;
    let result = tokio::select! {
        result = &mut serving => result,
        Some(changed) = watcher.changed() => {
            tracing::info!(" * Detected change in {}, reloading", changed.display());
            restart = true;
            shutdown.trigger();
            serving.await
        }
    };
    signals.abort();

    if restart {
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Server stopped with an error before reloading");
        }
        std::process::exit(EXIT_RESTART);
    }
    result
}
