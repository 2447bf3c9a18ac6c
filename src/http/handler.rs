//! Per-connection serving.
//!
//! # Responsibilities
//! - Optional TLS handshake
//! - HTTP/1.1 framing via hyper
//! - Run the application on the blocking pool for each request
//! - Map application failures to a 500 or, with passthrough, to a server fault
//! - Close the connection gracefully when shutdown is triggered

use std::sync::{Arc, Mutex};
use std::time::Instant;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;

use crate::app::{ServerInfo, SharedApp, StartResponse};
use crate::http::request;
use crate::http::response::{self, ResponseBody};
use crate::lifecycle::Shutdown;
use crate::middleware::debugger::panic_message;
use crate::net::connection::{ConnectionGuard, Io, Stream};
use crate::net::tls::TlsAcceptor;
use crate::net::PeerAddr;
use crate::observability::metrics;

/// First application error seen while errors are passed through.
#[derive(Debug, Clone, Default)]
pub struct FaultSlot {
    inner: Arc<Mutex<Option<String>>>,
}

impl FaultSlot {
    /// Keep `message` unless an earlier fault was already recorded.
    pub fn record(&self, message: String) {
        let mut slot = self.inner.lock().expect("fault slot poisoned");
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    pub fn take(&self) -> Option<String> {
        self.inner.lock().expect("fault slot poisoned").take()
    }
}

/// Service error that makes hyper drop the connection without a response.
///
/// Only raised for application errors while errors are passed through.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RequestAborted(String);

/// Everything a connection task needs, shared across connections.
pub struct ConnectionContext {
    pub app: SharedApp,
    pub server: ServerInfo,
    pub passthrough_errors: bool,
    /// Off when connections are served one at a time, so an idle client
    /// cannot hold the accept loop.
    pub keep_alive: bool,
    pub tls: Option<TlsAcceptor>,
    pub shutdown: Shutdown,
    pub fault: FaultSlot,
}

/// Serve every request on one accepted connection.
///
/// Returns when the client closes, the connection fails, or a triggered
/// shutdown has let the in-flight request finish.
pub async fn serve_connection(
    ctx: Arc<ConnectionContext>,
    stream: Stream,
    peer: PeerAddr,
    guard: ConnectionGuard,
) {
    let connection_id = guard.id();

    let io: Box<dyn Io> = match &ctx.tls {
        Some(tls) => {
            let handshake = tokio::select! {
                biased;
                _ = ctx.shutdown.wait() => return,
                result = tls.accept(stream) => result,
            };
            match handshake {
                Ok(io) => io,
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            }
        }
        None => Box::new(stream),
    };

    let service_ctx = Arc::clone(&ctx);
    let service = service_fn(move |request: Request<Incoming>| {
        let ctx = Arc::clone(&service_ctx);
        async move { handle_request(&ctx, request, peer).await }
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .keep_alive(ctx.keep_alive)
        .serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    let shutdown = ctx.shutdown.wait();
    tokio::pin!(shutdown);
    let mut draining = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown, if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "Connection ended with error");
                }
                break;
            }
        }
    }

    drop(guard);
}

async fn handle_request(
    ctx: &ConnectionContext,
    request: Request<Incoming>,
    peer: PeerAddr,
) -> Result<Response<ResponseBody>, RequestAborted> {
    let start_time = Instant::now();

    let environ = match request::into_environ(request, peer, ctx.server.clone()).await {
        Ok(environ) => environ,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "Failed to read request body");
            return Ok(response::bad_request());
        }
    };

    let request_id = environ.request_id;
    let method = environ.method.clone();
    let path = environ.request_uri();

    let app = Arc::clone(&ctx.app);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut start_response = StartResponse::new();
        let result = app.call(&environ, &mut start_response);
        (start_response, result)
    })
    .await;

    let completed = match outcome {
        Ok((start_response, Ok(chunks))) => match start_response.into_parts() {
            Some((status, headers)) => Ok(response::from_application(status, headers, chunks, request_id)),
            None => Err("application returned without starting a response".to_string()),
        },
        Ok((_, Err(error))) => Err(error_chain(error.as_ref())),
        Err(join_error) if join_error.is_panic() => {
            let payload = join_error.into_panic();
            Err(format!("application panicked: {}", panic_message(payload.as_ref())))
        }
        Err(join_error) => Err(format!("application task failed: {join_error}")),
    };

    let response = match completed {
        Ok(response) => response,
        Err(message) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %message,
                "Error on request"
            );

            if ctx.passthrough_errors {
                metrics::record_request(method.as_str(), 500, start_time);
                ctx.fault.record(message.clone());
                ctx.shutdown.trigger();
                return Err(RequestAborted(message));
            }
            response::internal_server_error(request_id)
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, start_time);
    tracing::info!(
        request_id = %request_id,
        peer = %peer.host(),
        method = %method,
        path = %path,
        status,
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Request handled"
    );

    Ok(response)
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
