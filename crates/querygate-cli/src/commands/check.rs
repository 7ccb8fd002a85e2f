//! Check command for validating a QueryGate configuration.
//!
//! `querygate check` - Validate the configuration file, compile the block
//! patterns, and optionally classify a statement.

use querygate_core::GateConfig;
use querygate_proxy::{RegexClassifier, SqlClassifier};
use std::path::PathBuf;

pub fn check(config_path: PathBuf, sql: Option<&str>) -> anyhow::Result<()> {
    let config = GateConfig::load_from_file(&config_path)?;

    println!(
        "Configuration OK: listen {} -> backend {}",
        config.proxy.listen_address(),
        config.backend.address()
    );
    if config.proxy.tls.enabled && !config.proxy.tls.is_usable() {
        println!("warning: tls.enabled is set but cert_file/key_file are incomplete");
    }

    let classifier = RegexClassifier::from_config(&config.classifier)?;
    println!(
        "{} block pattern(s) compiled",
        config.classifier.block_patterns.len()
    );

    if let Some(sql) = sql {
        if classifier.should_block(sql) {
            println!("BLOCKED: statement would be held for approval");
        } else {
            println!("PASS: statement would be forwarded");
        }
    }
    Ok(())
}
