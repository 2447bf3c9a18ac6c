//! Request intake.
//!
//! # Responsibilities
//! - Buffer the request body
//! - Build the [`Environ`] the application sees, request ID included
//!
//! # Design Decisions
//! - Request ID assigned as early as possible for tracing
//! - Bodies are read in full before the application runs, since applications
//!   are synchronous and run off the async runtime

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;

use crate::app::{Environ, ServerInfo};
use crate::net::PeerAddr;

/// Header carrying the request ID back to the client.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Read the whole request and turn it into an environ.
pub async fn into_environ(
    request: Request<Incoming>,
    peer: PeerAddr,
    server: ServerInfo,
) -> Result<Environ, hyper::Error> {
    let (parts, body) = request.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(Environ::new(&parts, body, peer, server))
}
