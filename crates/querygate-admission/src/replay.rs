//! Replay protection for resolution requests.
//!
//! Every approve/reject request from the API layer carries a nonce and a
//! timestamp. A nonce may be used once within the skew window; replays are
//! rejected and audit-logged as security events distinct from ordinary
//! validation failures.

use querygate_audit::AuditLogger;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Allowed clock skew between the caller and the proxy; doubles as the
/// nonce TTL.
pub const REPLAY_SKEW: Duration = Duration::from_secs(5 * 60);

/// Replay validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    /// The request carried no nonce.
    #[error("missing nonce")]
    MissingNonce,

    /// The request timestamp is outside the skew window.
    #[error("request timestamp outside allowed window")]
    StaleTimestamp,

    /// The nonce was already used within the TTL.
    #[error("duplicate nonce")]
    DuplicateNonce,
}

/// Time-boxed single-use nonce store.
pub struct ReplayGuard {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
    audit: Arc<AuditLogger>,
}

impl ReplayGuard {
    /// Create a guard with the default five-minute window.
    pub fn new(audit: Arc<AuditLogger>) -> Self {
        Self::with_ttl(audit, REPLAY_SKEW)
    }

    /// Create a guard with a custom window.
    pub fn with_ttl(audit: Arc<AuditLogger>, ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
            audit,
        }
    }

    /// Validate a resolution request.
    ///
    /// The nonce is test-and-set atomically under `scope`: the first caller
    /// wins, all later callers with the same nonce fail, including
    /// concurrent ones.
    pub async fn validate(
        &self,
        nonce: &str,
        timestamp_millis: i64,
        scope: &str,
        actor: &str,
    ) -> Result<(), ReplayError> {
        if nonce.trim().is_empty() {
            tracing::warn!(actor = %actor, "Replay protection: missing nonce");
            return Err(ReplayError::MissingNonce);
        }

        let now_millis = chrono::Utc::now().timestamp_millis();
        let skew = now_millis.abs_diff(timestamp_millis);
        if skew > self.ttl.as_millis() as u64 {
            tracing::warn!(actor = %actor, skew_ms = skew, "Replay protection: stale timestamp");
            return Err(ReplayError::StaleTimestamp);
        }

        let key = format!("{scope}:{nonce}");
        let fresh = {
            let mut seen = match self.seen.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            seen.retain(|_, inserted| now.duration_since(*inserted) < self.ttl);
            match seen.entry(key) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(now);
                    true
                }
            }
        };

        if !fresh {
            tracing::warn!(actor = %actor, scope = %scope, "Replay protection: duplicate nonce");
            if let Err(e) = self
                .audit
                .log_replay_detected(actor, &format!("duplicate nonce in scope {scope}"))
                .await
            {
                tracing::warn!(error = %e, "Failed to audit replay detection");
            }
            return Err(ReplayError::DuplicateNonce);
        }

        Ok(())
    }
}
