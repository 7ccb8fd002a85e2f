//! CLI command implementations for QueryGate.

pub mod check;
pub mod serve;
