//! # querygate-core
//!
//! Shared configuration types for QueryGate.
//!
//! Configuration is loaded from a single YAML file (`querygate.yaml`) and
//! combined into a [`GateConfig`] consumed by the proxy, admission-control,
//! and audit crates.

pub mod config;

pub use config::{
    ApprovalConfig, AuditConfig, BackendConfig, ClassifierConfig, ConfigError, GateConfig,
    ProxyConfig, TlsConfig,
};
