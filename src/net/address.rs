//! Address resolution.
//!
//! # Responsibilities
//! - Classify an address string as a TCP endpoint or a Unix socket path
//! - Hand every downstream component one [`Address`] to trust
//!
//! # Design Decisions
//! - Classification is purely syntactic, nothing touches the network or disk
//! - Ambiguity resolves in favour of TCP when the string looks like `host:port`
//! - Resolution never fails: any string is an acceptable path

use std::fmt;
use std::path::{Path, PathBuf};

/// Host used when an address omits one (`""` or `":8080"`).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when the address string is empty.
pub const DEFAULT_PORT: u16 = 5000;

/// Explicit prefix forcing the Unix-socket interpretation.
const UNIX_PREFIX: &str = "unix:";

/// The socket family an [`Address`] binds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4 or IPv6 stream socket.
    Inet,
    /// Unix domain stream socket.
    Unix,
}

impl AddressFamily {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "tcp",
            AddressFamily::Unix => "unix",
        }
    }
}

/// A resolved listening address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// TCP endpoint.
    Tcp {
        /// Hostname or IP literal (IPv6 without brackets).
        host: String,
        /// Port, `0` asks the OS for an ephemeral one.
        port: u16,
    },
    /// Unix domain socket bound to a filesystem path.
    Unix {
        /// Socket path, absolute or relative to the working directory.
        path: PathBuf,
    },
}

impl Address {
    /// Creates a TCP address.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Creates a Unix socket address.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// The socket family this address binds with.
    pub fn family(&self) -> AddressFamily {
        match self {
            Address::Tcp { .. } => AddressFamily::Inet,
            Address::Unix { .. } => AddressFamily::Unix,
        }
    }

    /// Socket path for Unix addresses.
    pub fn unix_path(&self) -> Option<&Path> {
        match self {
            Address::Unix { path } => Some(path),
            Address::Tcp { .. } => None,
        }
    }

    /// URL form announced in the startup banner.
    pub fn url(&self) -> String {
        match self {
            Address::Tcp { host, port } if host.contains(':') => format!("http://[{host}]:{port}/"),
            Address::Tcp { host, port } => format!("http://{host}:{port}/"),
            Address::Unix { path } => format!("unix://{}/", path.display()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Address::Tcp { host, port } => write!(f, "{host}:{port}"),
            Address::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve an address string.
///
/// `host:port` (including `[v6]:port` and `:port`) is TCP, the empty string is
/// the default TCP endpoint, everything else is a Unix socket path.
pub fn resolve(input: &str) -> Address {
    if let Some(rest) = input.strip_prefix(UNIX_PREFIX) {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        return Address::unix(path);
    }

    if input.is_empty() {
        return Address::tcp(DEFAULT_HOST, DEFAULT_PORT);
    }

    match split_host_port(input) {
        Some((host, port)) => Address::tcp(host, port),
        None => Address::unix(input),
    }
}

fn split_host_port(input: &str) -> Option<(String, u16)> {
    // Bracketed IPv6 literal: "[::1]:8080".
    if let Some(rest) = input.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?.parse().ok()?;
        if host.is_empty() || host.contains('/') {
            return None;
        }
        return Some((host.to_string(), port));
    }

    let (host, port) = input.rsplit_once(':')?;
    if host.contains(':') || host.contains('/') || host.chars().any(char::is_whitespace) {
        return None;
    }
    let port = parse_port(port)?;
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    Some((host.to_string(), port))
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_is_tcp() {
        assert_eq!(resolve("127.0.0.1:8080"), Address::tcp("127.0.0.1", 8080));
        assert_eq!(resolve("localhost:5000"), Address::tcp("localhost", 5000));
        assert_eq!(resolve("0.0.0.0:0"), Address::tcp("0.0.0.0", 0));
        assert_eq!(resolve("[::1]:9000"), Address::tcp("::1", 9000));
        assert_eq!(resolve(":8080"), Address::tcp(DEFAULT_HOST, 8080));
    }

    #[test]
    fn empty_string_is_default_endpoint() {
        assert_eq!(resolve(""), Address::tcp(DEFAULT_HOST, DEFAULT_PORT));
    }

    #[test]
    fn paths_are_unix() {
        for input in [
            "/tmp/test.sock",
            "app.sock",
            "./run/app.sock",
            "/var/run/a/b/c/d/e/f/deep.sock",
            "/tmp/odd:name.sock",
            "/srv/host:80",
            "localhost",
            "host:notaport",
            "host:99999",
            "a:b:80",
        ] {
            assert_eq!(resolve(input).family(), AddressFamily::Unix, "{input}");
        }
    }

    #[test]
    fn long_paths_stay_unix() {
        let deep = format!("/{}", vec!["segment"; 200].join("/"));
        assert_eq!(resolve(&deep), Address::unix(deep.clone()));
    }

    #[test]
    fn unix_prefix_forces_path() {
        assert_eq!(resolve("unix:///tmp/x.sock"), Address::unix("/tmp/x.sock"));
        assert_eq!(resolve("unix:rel.sock"), Address::unix("rel.sock"));
        assert_eq!(resolve("unix:localhost:80"), Address::unix("localhost:80"));
    }

    #[test]
    fn banner_urls() {
        assert_eq!(Address::tcp("127.0.0.1", 5000).url(), "http://127.0.0.1:5000/");
        assert_eq!(Address::tcp("::1", 80).url(), "http://[::1]:80/");
        assert_eq!(
            Address::unix("/tmp/unix_sock_demo.app.sock").url(),
            "unix:///tmp/unix_sock_demo.app.sock/"
        );
    }
}
