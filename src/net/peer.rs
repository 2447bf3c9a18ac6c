//! Peer address normalization.
//!
//! Unix sockets carry no IP-layer peer, only local credentials. Applications
//! expect a `(host, port)` pair for logging and access control, so every
//! connection accepted over a Unix socket reports the same synthetic peer.

use std::fmt;
use std::net::SocketAddr;

use crate::net::connection::Stream;

/// Host reported for connections without an IP peer.
pub const SYNTHETIC_HOST: &str = "<local>";

/// Port reported for connections without an IP peer.
pub const SYNTHETIC_PORT: u16 = 0;

/// Peer address as reported by the transport.
#[derive(Debug)]
pub enum NativePeer {
    /// TCP peer.
    Inet(SocketAddr),
    /// Unix peer, usually unnamed.
    Unix(tokio::net::unix::SocketAddr),
}

/// Peer identity handed to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerAddr {
    /// Real client address of a TCP connection.
    Inet(SocketAddr),
    /// Placeholder `("<local>", 0)`. Identical for every Unix connection, so it
    /// must not be used to tell clients apart.
    Synthetic,
}

impl PeerAddr {
    /// Host part of the `(host, port)` pair.
    pub fn host(&self) -> String {
        match self {
            PeerAddr::Inet(addr) => addr.ip().to_string(),
            PeerAddr::Synthetic => SYNTHETIC_HOST.to_string(),
        }
    }

    /// Port part of the `(host, port)` pair.
    pub fn port(&self) -> u16 {
        match self {
            PeerAddr::Inet(addr) => addr.port(),
            PeerAddr::Synthetic => SYNTHETIC_PORT,
        }
    }

    /// The `(host, port)` pair.
    pub fn as_pair(&self) -> (String, u16) {
        (self.host(), self.port())
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, PeerAddr::Synthetic)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddr::Inet(addr) => write!(f, "{addr}"),
            PeerAddr::Synthetic => write!(f, "{SYNTHETIC_HOST}"),
        }
    }
}

impl From<NativePeer> for PeerAddr {
    fn from(native: NativePeer) -> Self {
        match native {
            NativePeer::Inet(addr) => PeerAddr::Inet(addr),
            NativePeer::Unix(_) => PeerAddr::Synthetic,
        }
    }
}

/// Pair an accepted stream with the peer address applications will see.
///
/// The stream itself is returned untouched.
pub fn wrap_connection(stream: Stream, native: NativePeer) -> (Stream, PeerAddr) {
    (stream, PeerAddr::from(native))
}
