//! Approval workflow configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the query approval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Whether blocked queries require peer voting instead of a single
    /// approver.
    #[serde(default)]
    pub peer_enabled: bool,

    /// Number of same-direction votes required to auto-resolve a query.
    #[serde(default = "default_min_votes")]
    pub min_votes: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            peer_enabled: false,
            min_votes: default_min_votes(),
        }
    }
}

fn default_min_votes() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_defaults() {
        let config = ApprovalConfig::default();
        assert!(!config.peer_enabled);
        assert_eq!(config.min_votes, 2);
    }
}
