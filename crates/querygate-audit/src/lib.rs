//! # querygate-audit
//!
//! Audit logging for QueryGate.
//!
//! Every security-relevant proxy event (a query being blocked, a resolution,
//! a peer vote, a replay attempt) is recorded as a structured
//! [`AuditEvent`] and written to the configured storage backend.
//!
//! - **Console output**: JSON Lines on stdout.
//! - **File output**: JSON Lines appended to `<directory>/audit.log`.
//!
//! Audit writes are best-effort from the caller's point of view: resolution
//! of a blocked query never fails because the audit sink does.

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::AuditLogger;
pub use storage::{AuditStorage, ConsoleStorage, FileStorage, NullStorage};
