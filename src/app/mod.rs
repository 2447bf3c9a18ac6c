//! Application interface.
//!
//! # Data Flow
//! ```text
//! hyper request + PeerAddr
//!     → environ.rs (CGI-style request environment)
//!     → Application::call(environ, start_response)
//!     → status + headers recorded by StartResponse, body chunks returned
//!     → hyper response
//! ```
//!
//! # Design Decisions
//! - Applications are synchronous; the server runs them on the blocking pool
//! - The server never inspects request content beyond building the environ
//! - Middleware is an `Application` wrapping another `Application`

pub mod environ;

use std::sync::Arc;

use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};

pub use environ::{Environ, ServerInfo};

/// Error type applications and middleware return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body as an ordered list of chunks.
pub type Body = Vec<Bytes>;

/// Application shared between connections.
pub type SharedApp = Arc<dyn Application>;

/// A synchronous web application.
///
/// The application reads the request from `environ`, reports status and
/// headers through `start_response`, and returns the body chunks.
pub trait Application: Send + Sync + 'static {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError>;
}

impl<F> Application for F
where
    F: Fn(&Environ, &mut StartResponse) -> Result<Body, BoxError> + Send + Sync + 'static,
{
    fn call(&self, environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
        self(environ, start_response)
    }
}

impl<A: Application + ?Sized> Application for Arc<A> {
    fn call(&self, environ: &Environ, start_response: &mut StartResponse) -> Result<Body, BoxError> {
        (**self).call(environ, start_response)
    }
}

/// Collects the status line and headers an application chooses.
///
/// Calling [`StartResponse::start`] again replaces the earlier status and
/// headers, which lets error handlers override a partially started response.
#[derive(Debug, Default)]
pub struct StartResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl StartResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response status and headers.
    pub fn start(&mut self, status: StatusCode, headers: HeaderMap) {
        self.status = Some(status);
        self.headers = headers;
    }

    /// Shorthand for `start` with `(name, value)` pairs.
    ///
    /// Pairs with an invalid header name or value are skipped.
    pub fn start_with(&mut self, status: StatusCode, headers: &[(&str, &str)]) {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            match (HeaderName::try_from(*name), HeaderValue::try_from(*value)) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid response header"),
            }
        }
        self.start(status, map);
    }

    pub fn is_started(&self) -> bool {
        self.status.is_some()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume into status and headers, `None` if `start` was never called.
    pub fn into_parts(self) -> Option<(StatusCode, HeaderMap)> {
        self.status.map(|status| (status, self.headers))
    }
}

/// Single-chunk body from anything convertible to bytes.
pub fn body(chunk: impl Into<Bytes>) -> Body {
    vec![chunk.into()]
}
