//! Command handlers module.
//!
//! - `check.rs`: validation against a database
//! - `report.rs`: configuration echo and default file creation
//! - `snapshot.rs`: cached player data
//!
//! Handlers return `Ok(false)` when the command ran but the outcome should
//! produce a failing exit code.

mod check;
mod report;
mod snapshot;

use anyhow::Context;
use community_bridge::BridgeConfig;
use std::path::Path;

pub use check::cmd_check;
pub use report::{cmd_init, cmd_report};
pub use snapshot::cmd_snapshot;

fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    BridgeConfig::load_from_file(path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}
