//! Report and init command handlers.

use super::load_config;
use community_bridge::BridgeConfig;
use std::path::Path;

/// Prints the effective configuration.
pub fn cmd_report(config_path: &Path) -> anyhow::Result<bool> {
    let config = load_config(config_path)?;
    println!("Configuration: {}", config_path.display());
    println!("Player data:   {}", config.cache_directory().display());
    println!();
    for line in config.report() {
        println!("{line}");
    }
    Ok(true)
}

/// Writes the default configuration file unless one exists.
pub fn cmd_init(config_path: &Path) -> anyhow::Result<bool> {
    if BridgeConfig::save_default(config_path)? {
        println!("Wrote default configuration to {}", config_path.display());
    } else {
        println!("{} already exists; left unchanged", config_path.display());
    }
    Ok(true)
}
