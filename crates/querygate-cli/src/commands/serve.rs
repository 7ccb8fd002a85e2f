//! Serve command for starting the QueryGate proxy.
//!
//! `querygate serve` - Start the intercepting proxy server.

use querygate_admission::{AdmissionRegistry, LogSink, MemoryStore};
use querygate_audit::AuditLogger;
use querygate_core::GateConfig;
use querygate_proxy::{ProxyServer, RegexClassifier};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn serve(config_path: PathBuf) -> anyhow::Result<()> {
    // A missing file at the default location means "run with defaults";
    // an unreadable or malformed file is still an error.
    let config = if config_path.exists() {
        tracing::info!(config = %config_path.display(), "Loading configuration");
        GateConfig::load_from_file(&config_path)?
    } else {
        tracing::info!(
            config = %config_path.display(),
            "Configuration file not found, using defaults"
        );
        GateConfig::default()
    };

    let audit = Arc::new(AuditLogger::new(&config.audit)?);
    let classifier = Arc::new(RegexClassifier::from_config(&config.classifier)?);
    let registry = Arc::new(AdmissionRegistry::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LogSink),
        audit.clone(),
        config.approval.clone(),
    ));

    let server = ProxyServer::new(config, classifier, registry, audit)?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping");
        }
    }
    Ok(())
}
