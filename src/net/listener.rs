//! Listening sockets for TCP and Unix addresses.
//!
//! # Responsibilities
//! - Bind the socket family chosen by [`Address`]
//! - Remove stale Unix socket files before binding, and only socket files
//! - Accept connections and pass them through the peer shim
//! - Sort accept failures into transient and fatal
//! - Unlink the Unix socket path when the listener goes away

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, UnixListener};

use crate::net::address::{Address, AddressFamily};
use crate::net::connection::Stream;
use crate::net::peer::{wrap_connection, NativePeer, PeerAddr};

/// Pending-connection queue length passed to `listen(2)`.
pub const LISTEN_BACKLOG: u32 = 128;

/// Failure to bind a listening socket.
#[derive(Debug, Error)]
pub enum BindError {
    /// The Unix socket path exists but is not a socket.
    #[error("{} exists and is not a socket, refusing to remove it", path.display())]
    NotASocket { path: PathBuf },

    /// Something is still listening on the address.
    #[error("address already in use: {address}")]
    InUse { address: String },

    /// The TCP host did not resolve to any address.
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// Any other socket or filesystem failure.
    #[error("failed to bind {address}: {source}")]
    Io {
        address: String,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    fn io(address: &Address, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AddrInUse {
            return BindError::InUse {
                address: address.to_string(),
            };
        }
        BindError::Io {
            address: address.to_string(),
            source,
        }
    }
}

/// Failure to accept a connection.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// This attempt failed but the listening socket is still good.
    #[error("transient accept failure: {0}")]
    Transient(#[source] io::Error),

    /// The listening socket itself is unusable.
    #[error("listening socket failed: {0}")]
    Fatal(#[source] io::Error),
}

impl AcceptError {
    /// Sort an accept error by whether the listening socket survives it.
    pub fn classify(error: io::Error) -> Self {
        use io::ErrorKind::*;

        let transient_kind = matches!(
            error.kind(),
            ConnectionAborted | ConnectionReset | ConnectionRefused | Interrupted | WouldBlock | TimedOut
        );
        // Resource exhaustion leaves the listening socket usable.
        let transient_errno = error.raw_os_error().is_some_and(|code| {
            matches!(
                Errno::from_raw(code),
                Errno::EMFILE | Errno::ENFILE | Errno::ENOBUFS | Errno::ENOMEM
            )
        });

        if transient_kind || transient_errno {
            AcceptError::Transient(error)
        } else {
            AcceptError::Fatal(error)
        }
    }
}

/// Where a listener ended up bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddr {
    Inet(SocketAddr),
    Unix(PathBuf),
}

impl std::fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundAddr::Inet(addr) => write!(f, "{addr}"),
            BoundAddr::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Removes the socket file when dropped.
#[derive(Debug)]
pub struct SocketPathGuard {
    path: PathBuf,
}

impl Drop for SocketPathGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Socket file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// A bound listening socket.
#[derive(Debug)]
pub enum Listener {
    Tcp {
        inner: TcpListener,
        local_addr: SocketAddr,
    },
    Unix {
        inner: UnixListener,
        // Declared after `inner` so the socket closes before the path is unlinked.
        guard: SocketPathGuard,
    },
}

impl Listener {
    /// Bind to an address.
    ///
    /// For Unix addresses a stale socket file is removed first. A live socket
    /// or a non-socket file at the path is an error.
    pub async fn bind(address: &Address) -> Result<Self, BindError> {
        match address {
            Address::Tcp { host, port } => Self::bind_tcp(address, host, *port).await,
            Address::Unix { path } => Self::bind_unix(address, path),
        }
    }

    async fn bind_tcp(address: &Address, host: &str, port: u16) -> Result<Self, BindError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| BindError::io(address, e))?
            .next()
            .ok_or_else(|| BindError::Resolve {
                host: host.to_string(),
                port,
            })?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| BindError::io(address, e))?;

        socket.set_reuseaddr(true).map_err(|e| BindError::io(address, e))?;
        socket.bind(addr).map_err(|e| BindError::io(address, e))?;
        let inner = socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| BindError::io(address, e))?;
        let local_addr = inner.local_addr().map_err(|e| BindError::io(address, e))?;

        tracing::debug!(address = %local_addr, "TCP listener bound");
        Ok(Listener::Tcp { inner, local_addr })
    }

    fn bind_unix(address: &Address, path: &Path) -> Result<Self, BindError> {
        remove_stale_socket(path)?;

        let inner = UnixListener::bind(path).map_err(|e| BindError::io(address, e))?;

        tracing::debug!(path = %path.display(), "Unix listener bound");
        Ok(Listener::Unix {
            inner,
            guard: SocketPathGuard {
                path: path.to_path_buf(),
            },
        })
    }

    /// Check that an address is bindable without keeping the socket.
    ///
    /// Performs the same stale-path cleanup and bind as [`Listener::bind`],
    /// then closes the socket and removes the socket file it created.
    pub async fn probe(address: &Address) -> Result<(), BindError> {
        let listener = Self::bind(address).await?;
        tracing::debug!(address = %address, "Bind probe succeeded");
        drop(listener);
        Ok(())
    }

    /// Accept the next connection along with the peer address applications see.
    pub async fn accept(&self) -> Result<(Stream, PeerAddr), AcceptError> {
        match self {
            Listener::Tcp { inner, .. } => {
                let (stream, addr) = inner.accept().await.map_err(AcceptError::classify)?;
                stream.set_nodelay(true).ok();
                Ok(wrap_connection(Stream::Tcp(stream), NativePeer::Inet(addr)))
            }
            Listener::Unix { inner, .. } => {
                let (stream, addr) = inner.accept().await.map_err(AcceptError::classify)?;
                Ok(wrap_connection(Stream::Unix(stream), NativePeer::Unix(addr)))
            }
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            Listener::Tcp { .. } => AddressFamily::Inet,
            Listener::Unix { .. } => AddressFamily::Unix,
        }
    }

    /// The bound address, with the real port when port `0` was requested.
    pub fn local_addr(&self) -> BoundAddr {
        match self {
            Listener::Tcp { local_addr, .. } => BoundAddr::Inet(*local_addr),
            Listener::Unix { guard, .. } => BoundAddr::Unix(guard.path.clone()),
        }
    }

    /// Close the socket. Unix listeners also unlink their path.
    pub fn close(self) {
        drop(self);
    }
}

/// Remove a leftover socket file so `bind` does not fail with "address in use".
///
/// Missing paths are fine. A path that is not a socket is never removed, and a
/// socket something still listens on is reported as in use.
pub fn remove_stale_socket(path: &Path) -> Result<(), BindError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(BindError::Io {
                address: path.display().to_string(),
                source: e,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(BindError::NotASocket {
            path: path.to_path_buf(),
        });
    }

    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_) => {
            return Err(BindError::InUse {
                address: path.display().to_string(),
            })
        }
        Err(e) if is_stale(&e) => {}
        Err(e) => {
            return Err(BindError::Io {
                address: path.display().to_string(),
                source: e,
            })
        }
    }

    fs::remove_file(path).map_err(|e| BindError::Io {
        address: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "Removed stale socket file");
    Ok(())
}

/// Only a refused connection proves nobody listens. A full backlog or a
/// permission error still belongs to a live owner.
fn is_stale(connect_error: &io::Error) -> bool {
    connect_error.kind() == io::ErrorKind::ConnectionRefused
}
