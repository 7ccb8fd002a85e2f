//! TLS acceptor construction for the SSLRequest upgrade.

use crate::error::ProxyError;
use querygate_core::TlsConfig;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Build a TLS acceptor from the configured PEM files.
///
/// Returns `None` when TLS is disabled or only partially configured; the
/// proxy then answers every SSLRequest with a deny byte.
pub fn build_acceptor(config: &TlsConfig) -> Result<Option<TlsAcceptor>, ProxyError> {
    if !config.is_usable() {
        if config.enabled {
            tracing::warn!("TLS enabled but cert_file/key_file missing, SSLRequests will be denied");
        }
        return Ok(None);
    }

    // is_usable() guarantees both paths are present.
    let (Some(cert_file), Some(key_file)) = (&config.cert_file, &config.key_file) else {
        return Ok(None);
    };

    let certs = load_certs(cert_file)?;
    let key = load_key(key_file)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::Tls(format!("invalid certificate or key: {e}")))?;

    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ProxyError> {
    let file = File::open(path)
        .map_err(|e| ProxyError::Tls(format!("failed to open cert file {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProxyError::Tls(format!("failed to read certs from {path}: {e}")))?;
    if certs.is_empty() {
        return Err(ProxyError::Tls(format!("no certificates found in {path}")));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ProxyError> {
    let file = File::open(path)
        .map_err(|e| ProxyError::Tls(format!("failed to open key file {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ProxyError::Tls(format!("failed to read key from {path}: {e}")))?
        .ok_or_else(|| ProxyError::Tls(format!("no private key found in {path}")))
}
