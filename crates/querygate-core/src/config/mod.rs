//! Configuration types for the QueryGate proxy.
//!
//! All settings live in one YAML file. Every field has a serde default so a
//! minimal file (or none at all) yields a working development configuration:
//!
//! ```yaml
//! proxy:
//!   listen_port: 5433
//! backend:
//!   host: localhost
//!   port: 5432
//! approval:
//!   peer_enabled: true
//!   min_votes: 2
//! ```

pub mod approval;
pub mod audit;
pub mod classifier;
pub mod proxy;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use approval::ApprovalConfig;
pub use audit::AuditConfig;
pub use classifier::ClassifierConfig;
pub use proxy::{BackendConfig, ProxyConfig, TlsConfig};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Complete QueryGate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GateConfig {
    /// Listener settings.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Backend Postgres settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Approval workflow settings.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// SQL classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }
}
