//! # community-bridge
//!
//! Keeps a game server's player roster, a web application's user/group
//! tables and a local permissions system in agreement.
//!
//! The crate covers the two pieces of that bridge that need real care:
//!
//! - **Feature validation**: the configuration names tables and columns in
//!   the web application's database for every optional feature. At load or
//!   reload each binding is checked through a [`QueryPort`] and features whose
//!   backing storage is missing are switched off, cascading to the features
//!   that depend on them.
//! - **Player state reconciliation**: for every connecting player a
//!   [`Snapshot`] of group membership and wallet balances is built from the
//!   cached record and the live authorities, then persisted so that the
//!   synchronization pass can diff old against new.
//!
//! ## Example
//!
//! ```rust,ignore
//! use community_bridge::{BridgeConfig, ConfigDocument, FeatureValidator};
//! use community_bridge::storage::SqliteQueryPort;
//!
//! let document = ConfigDocument::from_path("plugins/CommunityBridge/config.yml".as_ref())?;
//! let mut config = BridgeConfig::load(&document)?;
//! let port = SqliteQueryPort::open("forum.db")?;
//! let report = FeatureValidator::new().validate(&mut config, &port);
//! if !report.passed() {
//!     tracing::warn!("configuration has problems, some features were disabled");
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod authority;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod validation;

pub use authority::{EconomyEngine, PermissionAuthority, WebApplicationAuthority};
pub use config::{BridgeConfig, BridgeConfigBuilder, ConfigDocument, FeatureFlags, Tracker};
pub use models::{PlayerIdentity, Snapshot};
pub use services::{PlayerPhase, PlayerState, PlayerStateReconciler};
pub use storage::{CacheRecord, CacheStore, FilesystemCacheStore, QueryPort, SqliteQueryPort};
pub use validation::{FeatureValidator, Severity, ValidationEntry, ValidationReport};

/// Error type for bridge operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Parse` | A configuration key holds a value of the wrong type, or the document is not valid YAML/TOML |
/// | `Validation` | A referenced table or column is missing, or a schema query errored |
/// | `Io` | A cache record or configuration file cannot be read or written |
/// | `DependencyUnsatisfied` | A feature is enabled but a feature it needs was disabled |
/// | `InvalidInput` | A cache key contains characters that could escape the cache directory |
/// | `OperationFailed` | An adapter or the logging subsystem failed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A configuration value could not be interpreted.
    ///
    /// Aborts loading of that document only.
    #[error("invalid value at '{key}': {cause}")]
    Parse {
        /// Key path of the offending value.
        key: String,
        /// What was wrong with it.
        cause: String,
    },

    /// A table or column binding did not pass validation.
    #[error("validation of '{setting}' failed: {cause}")]
    Validation {
        /// Configuration key that named the table or column.
        setting: String,
        /// Why the check failed.
        cause: String,
    },

    /// Cache or configuration file I/O failed.
    #[error("i/o during '{operation}' failed: {cause}")]
    Io {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A feature lost a prerequisite feature.
    #[error("'{feature}' requires '{requires}'")]
    DependencyUnsatisfied {
        /// The dependent feature.
        feature: String,
        /// The feature it needs.
        requires: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
