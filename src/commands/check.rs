//! Check command handler.

use super::load_config;
use anyhow::Context;
use community_bridge::storage::SqliteQueryPort;
use community_bridge::{FeatureValidator, Severity};
use std::path::Path;

/// Validates the configuration against a `SQLite` database.
///
/// Returns `Ok(false)` if any hard check failed.
pub fn cmd_check(config_path: &Path, database: &Path) -> anyhow::Result<bool> {
    let mut config = load_config(config_path)?;
    let port = SqliteQueryPort::open(database)
        .with_context(|| format!("opening database {}", database.display()))?;

    let report = FeatureValidator::new().validate(&mut config, &port);

    for entry in report.entries() {
        let marker = match entry.severity {
            Severity::Warning => "warning",
            Severity::Severe => "SEVERE ",
        };
        println!("{marker}: {}", entry.message);
    }

    let disabled = report.disabled_features();
    if !disabled.is_empty() {
        println!();
        println!("Disabled features:");
        for feature in &disabled {
            println!("  - {feature}");
        }
    }

    println!();
    if report.passed() {
        println!("Configuration OK");
    } else {
        println!("Configuration has errors");
    }
    Ok(report.passed())
}
