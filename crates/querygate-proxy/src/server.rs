//! Listener and accept loop.

use crate::classifier::SqlClassifier;
use crate::connection::Connection;
use crate::error::ProxyError;
use crate::tls;
use querygate_admission::AdmissionRegistry;
use querygate_audit::AuditLogger;
use querygate_core::GateConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// The intercepting proxy server.
pub struct ProxyServer {
    config: GateConfig,
    classifier: Arc<dyn SqlClassifier>,
    registry: Arc<AdmissionRegistry>,
    audit: Arc<AuditLogger>,
    tls: Option<TlsAcceptor>,
    next_conn: AtomicU64,
}

impl ProxyServer {
    /// Create a new server. Builds the TLS acceptor up front so a broken
    /// certificate configuration fails at startup, not per connection.
    pub fn new(
        config: GateConfig,
        classifier: Arc<dyn SqlClassifier>,
        registry: Arc<AdmissionRegistry>,
        audit: Arc<AuditLogger>,
    ) -> Result<Self, ProxyError> {
        let tls = tls::build_acceptor(&config.proxy.tls)?;
        Ok(Self {
            config,
            classifier,
            registry,
            audit,
            tls,
            next_conn: AtomicU64::new(1),
        })
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the accept loop. Each connection gets a `conn-<n>` id and its own
    /// task; accept errors are logged and the loop continues.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let listen_addr = self.config.proxy.listen_address();

        tracing::info!(
            listen_addr = %listen_addr,
            backend = %self.config.backend.address(),
            tls = self.tls.is_some(),
            "Starting QueryGate proxy server"
        );

        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|e| ProxyError::BindFailed {
                address: listen_addr.clone(),
                source: e,
            })?;

        tracing::info!(address = %listen_addr, "Proxy server listening");

        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let conn_id = format!("conn-{}", self.next_conn.fetch_add(1, Ordering::Relaxed));
            tracing::info!(conn_id = %conn_id, peer = %peer_addr, "New connection");

            if let Err(e) = self.audit.log_connection(true, &conn_id).await {
                tracing::warn!(conn_id = %conn_id, error = %e, "Failed to audit connect");
            }

            let connection = Connection::new(
                conn_id,
                self.config.backend.clone(),
                self.classifier.clone(),
                self.registry.clone(),
                self.audit.clone(),
                self.tls.clone(),
            );

            tokio::spawn(async move {
                connection.run(socket).await;
            });
        }
    }
}
