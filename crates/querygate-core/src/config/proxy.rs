//! Listener and backend configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the client-facing listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port to listen on for incoming Postgres connections.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// TLS configuration for the SSLRequest upgrade.
    #[serde(default)]
    pub tls: TlsConfig,
}

impl ProxyConfig {
    /// The socket address string to bind.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            tls: TlsConfig::default(),
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// Whether the SSLRequest upgrade is offered to clients.
    #[serde(default)]
    pub enabled: bool,

    /// Path to the PEM certificate chain.
    #[serde(default)]
    pub cert_file: Option<String>,

    /// Path to the PEM private key.
    #[serde(default)]
    pub key_file: Option<String>,
}

impl TlsConfig {
    /// TLS is usable only when enabled and both file paths are present.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// Configuration for the backend Postgres connection.
///
/// The proxy forwards the client's own startup and authentication bytes, so
/// no credentials are configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Hostname of the backend Postgres server.
    #[serde(default = "default_backend_host")]
    pub host: String,

    /// Port of the backend Postgres server.
    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Maximum time to wait for the backend dial, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl BackendConfig {
    /// The socket address string to dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            port: default_backend_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    5433
}

fn default_backend_host() -> String {
    "localhost".to_string()
}

fn default_backend_port() -> u16 {
    5432
}

fn default_connect_timeout_secs() -> u64 {
    5
}
