//! SQL classifier configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the SQL classifier.
///
/// Each pattern is a case-insensitive regular expression matched against the
/// raw SQL text of every Simple Query and Parse message. A query matching any
/// pattern is held for approval instead of being forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Regular expressions identifying queries that must be held.
    #[serde(default = "default_block_patterns")]
    pub block_patterns: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            block_patterns: default_block_patterns(),
        }
    }
}

fn default_block_patterns() -> Vec<String> {
    vec![
        r"^\s*DROP\s".to_string(),
        r"^\s*TRUNCATE\s".to_string(),
        r"^\s*ALTER\s".to_string(),
        r"^\s*GRANT\s".to_string(),
        r"^\s*REVOKE\s".to_string(),
        // DELETE statements with no WHERE clause
        r"^\s*DELETE\s+FROM\s+[^\s;]+\s*;?\s*$".to_string(),
    ]
}
