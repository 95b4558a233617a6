//! Per-player group and wallet snapshot.

use crate::storage::CacheRecord;
use serde::{Deserialize, Serialize};

/// Key paths used in cache records.
pub mod record_keys {
    /// Display name at the time of the last save.
    pub const LAST_KNOWN_NAME: &str = "last-known-name";
    /// In-game wallet balance.
    pub const MINECRAFT_MONEY: &str = "minecraft-money";
    /// Web application wallet balance.
    pub const WEB_APPLICATION_MONEY: &str = "web-application-money";
    /// Primary group name in the permissions system.
    pub const PRIMARY_GROUP_NAME: &str = "permissions-system.primary-group-name";
    /// Group names in the permissions system.
    pub const GROUP_NAMES: &str = "permissions-system.group-names";
    /// Primary group ID in the web application.
    pub const WEBAPP_PRIMARY_GROUP_ID: &str = "webapp.primary-group-id";
    /// Secondary group IDs in the web application.
    pub const WEBAPP_GROUP_IDS: &str = "webapp.group-ids";
}

/// Group membership and wallet balances for one player, across the
/// permissions system, the web application and the economy engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Display name when the snapshot was taken.
    pub last_known_name: String,
    /// In-game wallet balance.
    pub minecraft_wallet: f64,
    /// Web application wallet balance.
    pub web_application_wallet: f64,
    /// Primary group in the permissions system.
    pub permissions_primary_group_name: String,
    /// Other groups in the permissions system, in authority order.
    pub permissions_group_names: Vec<String>,
    /// Primary group ID in the web application.
    pub webapp_primary_group_id: String,
    /// Secondary group IDs in the web application.
    pub webapp_group_ids: Vec<String>,
    /// `true` if no cache record existed when the snapshot was loaded.
    /// Describes the load, not the player, so it is never serialized.
    #[serde(default, skip_serializing)]
    pub is_new_file: bool,
}

impl Snapshot {
    /// A snapshot for a player seen for the first time.
    #[must_use]
    pub fn new_file() -> Self {
        Self {
            is_new_file: true,
            ..Self::default()
        }
    }

    /// Reads a snapshot from a cache record. Missing values take their
    /// zero defaults.
    #[must_use]
    pub fn from_record(record: &CacheRecord) -> Self {
        let text = |key: &str| record.get_string(key).unwrap_or_default();
        let list = |key: &str| record.get_list(key).map(<[String]>::to_vec).unwrap_or_default();
        Self {
            last_known_name: text(record_keys::LAST_KNOWN_NAME),
            minecraft_wallet: record.get_number(record_keys::MINECRAFT_MONEY).unwrap_or_default(),
            web_application_wallet: record
                .get_number(record_keys::WEB_APPLICATION_MONEY)
                .unwrap_or_default(),
            permissions_primary_group_name: text(record_keys::PRIMARY_GROUP_NAME),
            permissions_group_names: list(record_keys::GROUP_NAMES),
            webapp_primary_group_id: text(record_keys::WEBAPP_PRIMARY_GROUP_ID),
            webapp_group_ids: list(record_keys::WEBAPP_GROUP_IDS),
            is_new_file: false,
        }
    }

    /// Writes every field except `is_new_file` to a cache record.
    #[must_use]
    pub fn to_record(&self) -> CacheRecord {
        let mut record = CacheRecord::new();
        record.set_string(record_keys::LAST_KNOWN_NAME, &self.last_known_name);
        record.set_number(record_keys::MINECRAFT_MONEY, self.minecraft_wallet);
        record.set_number(record_keys::WEB_APPLICATION_MONEY, self.web_application_wallet);
        record.set_string(
            record_keys::PRIMARY_GROUP_NAME,
            &self.permissions_primary_group_name,
        );
        record.set_list(record_keys::GROUP_NAMES, self.permissions_group_names.clone());
        record.set_string(
            record_keys::WEBAPP_PRIMARY_GROUP_ID,
            &self.webapp_primary_group_id,
        );
        record.set_list(record_keys::WEBAPP_GROUP_IDS, self.webapp_group_ids.clone());
        record
    }
}
