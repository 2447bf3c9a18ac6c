//! HTTP server setup and the accept loop.
//!
//! # Responsibilities
//! - Refuse TLS on Unix sockets before any socket exists
//! - Bind the listener for the resolved address
//! - Accept connections and dispatch them per the concurrency mode
//! - Stop accepting on shutdown, unlink the socket path, drain connections
//! - Surface a passed-through application error as the serve result

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::app::{ServerInfo, SharedApp};
use crate::config::{Concurrency, ServerOptions};
use crate::error::ServeError;
use crate::http::handler::{self, ConnectionContext, FaultSlot};
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::tls::TlsAcceptor;
use crate::net::{AcceptError, Address, BoundAddr, Listener};
use crate::observability::metrics;

/// Pause after a transient accept failure, so running out of descriptors
/// does not turn the loop into a busy spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A bound development server.
///
/// Created by [`Server::bind`], consumed by [`Server::serve_forever`]. The
/// Unix socket file, if any, lives exactly as long as the listener inside.
pub struct Server {
    listener: Listener,
    address: Address,
    app: SharedApp,
    options: ServerOptions,
    tls: Option<TlsAcceptor>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    fault: FaultSlot,
}

impl Server {
    /// Create the listening socket for `address`.
    pub async fn bind(address: Address, app: SharedApp, options: ServerOptions) -> Result<Self, ServeError> {
        if let (Some(_), Address::Unix { path }) = (&options.tls, &address) {
            return Err(ServeError::TlsOverUnixSocket { path: path.clone() });
        }

        let tls = match &options.tls {
            Some(config) => Some(TlsAcceptor::from_config(config).await.map_err(ServeError::Tls)?),
            None => None,
        };

        let listener = Listener::bind(&address).await?;

        tracing::info!(
            address = %listener.local_addr(),
            family = listener.family().as_str(),
            tls = tls.is_some(),
            "Server bound"
        );

        Ok(Self {
            listener,
            address,
            app,
            options,
            tls,
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            fault: FaultSlot::default(),
        })
    }

    /// Handle that stops [`Server::serve_forever`] when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Where the listener is bound, with the real port for port `0`.
    pub fn local_addr(&self) -> BoundAddr {
        self.listener.local_addr()
    }

    fn server_info(&self) -> ServerInfo {
        let concurrency = self.options.concurrency();
        let (name, port) = match (&self.address, self.listener.local_addr()) {
            (Address::Tcp { host, .. }, BoundAddr::Inet(addr)) => (host.clone(), Some(addr.port())),
            (_, bound) => (bound.to_string(), None),
        };
        ServerInfo {
            name,
            port,
            url_scheme: if self.tls.is_some() { "https" } else { "http" },
            multithread: concurrency.is_multithread(),
            multiprocess: concurrency.is_multiprocess(),
        }
    }

    /// Accept and serve connections until shutdown is triggered.
    ///
    /// On the way out the listener is closed (removing a Unix socket file)
    /// before in-flight connections are drained. Returns
    /// [`ServeError::Application`] if an application error was passed through.
    pub async fn serve_forever(self) -> Result<(), ServeError> {
        let concurrency = self.options.concurrency();
        let ctx = Arc::new(ConnectionContext {
            app: Arc::clone(&self.app),
            server: self.server_info(),
            passthrough_errors: self.options.passthrough_errors,
            keep_alive: concurrency != Concurrency::Sequential,
            tls: self.tls.clone(),
            shutdown: self.shutdown.clone(),
            fault: self.fault.clone(),
        });

        let Server {
            listener,
            shutdown,
            tracker,
            fault,
            ..
        } = self;

        let pool = match concurrency {
            Concurrency::Pool(size) => Some(Arc::new(Semaphore::new(size))),
            _ => None,
        };

        tracing::info!(address = %listener.local_addr(), mode = ?concurrency, "Serving");

        loop {
            // Pool mode takes a slot before accepting, so excess clients wait
            // in the kernel backlog.
            let permit = match &pool {
                Some(pool) => tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    permit = Arc::clone(pool).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                None => None,
            };

            // Shutdown is checked first so a client already in the backlog is
            // never accepted once shutdown has been triggered.
            let accepted = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                result = listener.accept() => result,
            };

            let (stream, peer) = match accepted {
                Ok(connection) => connection,
                Err(AcceptError::Transient(e)) => {
                    tracing::warn!(error = %e, "Accept failed, retrying");
                    metrics::record_accept_error("transient");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
                Err(AcceptError::Fatal(e)) => {
                    tracing::error!(error = %e, "Listening socket failed, stopping");
                    metrics::record_accept_error("fatal");
                    break;
                }
            };

            metrics::record_connection(listener.family());
            let guard = tracker.track();
            tracing::debug!(connection_id = %guard.id(), peer = %peer, "Accepted connection");

            let connection = handler::serve_connection(Arc::clone(&ctx), stream, peer, guard);
            match concurrency {
                Concurrency::Sequential => connection.await,
                Concurrency::Threaded => {
                    tokio::spawn(connection);
                }
                Concurrency::Pool(_) => {
                    tokio::spawn(async move {
                        connection.await;
                        drop(permit);
                    });
                }
            }
        }

        let bound = listener.local_addr();
        listener.close();
        // Covers exits that were not caused by a trigger, such as a fatal accept error.
        shutdown.trigger();

        if tracker.active_count() > 0 {
            tracing::info!(active = tracker.active_count(), "Draining connections");
        }
        tracker.wait_for_shutdown().await;
        tracing::info!(address = %bound, "Server stopped");

        match fault.take() {
            Some(message) => Err(ServeError::Application(message)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("local_addr", &self.listener.local_addr())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
