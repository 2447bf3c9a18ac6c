//! TLS for TCP listeners.
//!
//! Only TCP addresses accept TLS. The server rejects a TLS configuration for a
//! Unix socket before it creates any socket.

use std::path::Path;

use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};

use crate::config::TlsConfig;
use crate::net::connection::{Io, Stream};

/// Performs the server side of the TLS handshake on accepted TCP streams.
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: RustlsAcceptor,
}

impl std::fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsAcceptor").finish_non_exhaustive()
    }
}

impl TlsAcceptor {
    /// Load the certificate chain and private key named by `config`.
    pub async fn from_config(config: &TlsConfig) -> Result<Self, std::io::Error> {
        let rustls = load_tls_config(&config.cert_path, &config.key_path).await?;
        Ok(Self {
            inner: RustlsAcceptor::new(rustls),
        })
    }

    /// Run the handshake and hand back the encrypted stream.
    pub async fn accept(&self, stream: Stream) -> Result<Box<dyn Io>, std::io::Error> {
        let (tls, ()) = self.inner.accept(stream, ()).await?;
        Ok(Box::new(tls))
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}
