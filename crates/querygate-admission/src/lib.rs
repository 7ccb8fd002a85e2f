//! # querygate-admission
//!
//! Admission control for QueryGate.
//!
//! When the proxy classifies a query as blocking, the connection hands the
//! original wire bytes to the [`AdmissionRegistry`] together with a
//! forward-callback and a reject-callback, and withholds forwarding. An
//! external resolver (the HTTP API, not part of this workspace) later calls
//! `approve`, `reject`, or `vote`; the registry resolves the suspension
//! exactly once, invoking one of the callbacks or dropping the bytes.
//!
//! The registry is the single owner of a suspended query's bytes from
//! `register` until resolution or connection cleanup. Persistence goes
//! through the [`QueryStore`] trait and live notifications through the
//! [`NotificationSink`] trait; both external collaborators are represented
//! here by in-memory/log implementations.
//!
//! The [`ReplayGuard`] protects resolution endpoints from replayed requests
//! with a time-boxed single-use nonce check.

pub mod error;
pub mod model;
pub mod notify;
pub mod pending;
pub mod registry;
pub mod replay;
pub mod store;

pub use error::AdmissionError;
pub use model::{ApprovalRecord, BlockedQuery, QueryKind, QueryStatus, VoteChoice};
pub use notify::{
    BlockedNotice, LogSink, NotificationSink, NotifyError, ResolutionNotice, VoteNotice,
    CHANNEL_APPROVALS, CHANNEL_BLOCKED, CHANNEL_VOTES,
};
pub use pending::{ForwardFn, RejectFn, VoteStatus};
pub use registry::{AdmissionRegistry, ResolutionAction, VoteOutcome, PEER_RESOLVER};
pub use replay::{ReplayError, ReplayGuard};
pub use store::{MemoryStore, QueryStore, StoreError};
