//! Audit logging configuration.

use serde::{Deserialize, Serialize};

/// Configuration for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether events are also written to stdout as JSON lines.
    #[serde(default = "default_stdout")]
    pub stdout: bool,

    /// Directory for the audit log file.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stdout: default_stdout(),
            directory: default_directory(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_stdout() -> bool {
    true
}

fn default_directory() -> String {
    "./audit".to_string()
}
