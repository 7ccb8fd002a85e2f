//! SQL classification: which statements must be held for approval.

use crate::error::ProxyError;
use querygate_core::ClassifierConfig;
use regex::{Regex, RegexBuilder};

/// Decides whether a statement is forwarded immediately or held for
/// approval.
///
/// Deliberately synchronous: classification sits on the per-frame hot path
/// and must not suspend the connection task. The decision is pattern-based;
/// what happens to a held query is the admission registry's business.
pub trait SqlClassifier: Send + Sync {
    /// Whether this statement must be held for approval.
    fn should_block(&self, sql: &str) -> bool;
}

/// Classifier matching SQL against a list of case-insensitive regexes.
pub struct RegexClassifier {
    patterns: Vec<Regex>,
}

impl RegexClassifier {
    /// Compile the configured block patterns. Any pattern failing to
    /// compile rejects the whole configuration.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ProxyError> {
        let patterns = config
            .block_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ProxyError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// A classifier that never blocks.
    pub fn permissive() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }
}

impl SqlClassifier for RegexClassifier {
    fn should_block(&self, sql: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_classifier() -> RegexClassifier {
        RegexClassifier::from_config(&ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn test_ddl_is_blocked() {
        let classifier = default_classifier();
        assert!(classifier.should_block("DROP TABLE users"));
        assert!(classifier.should_block("  truncate audit_log"));
        assert!(classifier.should_block("ALTER TABLE t ADD COLUMN c int"));
        assert!(classifier.should_block("GRANT ALL ON t TO intern"));
        assert!(classifier.should_block("revoke select on t from app"));
    }

    #[test]
    fn test_delete_without_where_is_blocked() {
        let classifier = default_classifier();
        assert!(classifier.should_block("DELETE FROM users"));
        assert!(classifier.should_block("DELETE FROM users;"));
        assert!(!classifier.should_block("DELETE FROM users WHERE id = 1"));
    }

    #[test]
    fn test_reads_pass() {
        let classifier = default_classifier();
        assert!(!classifier.should_block("SELECT * FROM users"));
        assert!(!classifier.should_block("INSERT INTO t VALUES (1)"));
        // Mentions of keywords inside strings still match pattern-wise only
        // when anchored; a plain SELECT never does.
        assert!(!classifier.should_block("SELECT 'DROP TABLE users'"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let classifier = default_classifier();
        assert!(classifier.should_block("drop table users"));
        assert!(classifier.should_block("DrOp TaBlE users"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = ClassifierConfig {
            block_patterns: vec!["(unclosed".to_string()],
        };
        assert!(matches!(
            RegexClassifier::from_config(&config),
            Err(ProxyError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_permissive_blocks_nothing() {
        let classifier = RegexClassifier::permissive();
        assert!(!classifier.should_block("DROP TABLE users"));
    }
}
