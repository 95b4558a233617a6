//! Configuration management.
//!
//! [`BridgeConfig`] is the typed form of the bridge's configuration document.
//! It is produced once per load or reload, either from a [`ConfigDocument`]
//! or assembled in code through [`BridgeConfigBuilder`], and is read-only
//! afterwards except for its [`FeatureFlags`], which can only be narrowed:
//! validation and host capability checks switch features off, nothing
//! switches them back on.

mod bindings;
mod document;
mod features;

pub use bindings::{
    BanMethod, InsertMethod, SecondaryGroupStorage, SyncDirection, TableBinding, TrackerBinding,
};
pub use document::ConfigDocument;
pub use features::{FeatureFlags, Tracker, TrackerFlags};

use crate::observability::{self, LogLevel};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The default configuration document, listing every key with its default.
pub const DEFAULT_CONFIG: &str = include_str!("default.yml");

/// Name of the cache directory inside the data folder.
pub const CACHE_DIRECTORY_NAME: &str = "Players";

const KNOWN_SECTIONS: [&str; 11] = [
    "general",
    "database",
    "player-user-linking",
    "app-avatar-config",
    "app-post-count-config",
    "requirement",
    "statistics",
    "app-group-config",
    "simple-synchronization",
    "ban-synchronization",
    "version",
];

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Verbosity.
    pub log_level: LogLevel,
    /// Whether anonymous usage metrics may be reported.
    pub plugin_metrics: bool,
    /// Whether achievements are in use (they pay out through the economy).
    pub use_achievements: bool,
    /// Name of the permissions system to hook.
    pub permissions_system: String,
    /// Unit for the `*-every` intervals (`ticks`, `seconds`, ...).
    pub auto_every_unit: String,
    /// Whether to synchronize periodically.
    pub auto_sync: bool,
    /// Interval between periodic synchronizations.
    pub auto_sync_every: i64,
    /// Whether to synchronize when a player joins.
    pub sync_during_join: bool,
    /// Whether to synchronize when a player quits.
    pub sync_during_quit: bool,
    /// Public URL of the web application.
    pub application_url: String,
    /// Date format for formatted tracker values.
    pub date_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Config,
            plugin_metrics: true,
            use_achievements: false,
            permissions_system: String::new(),
            auto_every_unit: "ticks".to_string(),
            auto_sync: false,
            auto_sync_every: 24_000,
            sync_during_join: true,
            sync_during_quit: true,
            application_url: "http://www.example.org/".to_string(),
            date_format: "yyyy-MM-dd hh:mm:ss a".to_string(),
        }
    }
}

/// Web application database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: String,
    /// Database name.
    pub name: String,
    /// User name.
    pub username: String,
    /// Password; never echoed.
    pub password: SecretString,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            name: String::new(),
            username: String::new(),
            password: SecretString::from(String::new()),
        }
    }
}

impl PartialEq for DatabaseConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.name == other.name
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

/// Player to web application user linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkingConfig {
    /// Linking table. With key-value storage the key column, value column
    /// and key name are set.
    pub binding: TableBinding,
    /// Column holding the player name, for direct-column storage.
    pub player_name_column: String,
    /// Whether to periodically remind unregistered players.
    pub auto_remind: bool,
    /// Reminder interval.
    pub auto_remind_every: i64,
    /// Greet registered players.
    pub notify_registered: bool,
    /// Remind unregistered players on join.
    pub notify_unregistered: bool,
    /// Kick unregistered players.
    pub kick_unregistered: bool,
    /// Group assigned to unregistered players.
    pub unregistered_group: String,
    /// Group assigned to registered players.
    pub registered_group: String,
    /// Tell players when their group changes.
    pub notify_player_group: bool,
    /// Only move players out of the unregistered group.
    pub registered_former_unregistered_only: bool,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            binding: TableBinding::default(),
            player_name_column: String::new(),
            auto_remind: false,
            auto_remind_every: 12_000,
            notify_registered: true,
            notify_unregistered: true,
            kick_unregistered: false,
            unregistered_group: String::new(),
            registered_group: String::new(),
            notify_player_group: false,
            registered_former_unregistered_only: false,
        }
    }
}

/// Avatar lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvatarConfig {
    /// Avatar table.
    pub binding: TableBinding,
    /// Column holding the avatar.
    pub avatar_column: String,
}

/// Post count lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostCountConfig {
    /// Post count table.
    pub binding: TableBinding,
    /// Column holding the post count.
    pub post_count_column: String,
    /// Minimum posts when the requirement is enabled.
    pub minimum_posts: i32,
}

/// First-contact row creation for statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsInsert {
    /// Insert flavour.
    pub method: InsertMethod,
    /// Theme ID column, for [`InsertMethod::Smf`].
    pub theme_id_column: String,
    /// Theme ID value, for [`InsertMethod::Smf`].
    pub theme_id: String,
}

impl Default for StatisticsInsert {
    fn default() -> Self {
        Self {
            method: InsertMethod::Generic,
            theme_id_column: "id_theme".to_string(),
            theme_id: "1".to_string(),
        }
    }
}

/// Statistics tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsConfig {
    /// Statistics table. With key-value storage the key and value columns
    /// are set.
    pub binding: TableBinding,
    /// Row creation on first contact, if enabled.
    pub insert: Option<StatisticsInsert>,
    /// Where each tracker writes.
    pub trackers: BTreeMap<Tracker, TrackerBinding>,
    /// Value written by the online-status tracker while online.
    pub online_value: String,
    /// Value written by the online-status tracker while offline.
    pub offline_value: String,
}

impl StatisticsConfig {
    /// Returns a tracker's binding.
    #[must_use]
    pub fn tracker(&self, tracker: Tracker) -> Option<&TrackerBinding> {
        self.trackers.get(&tracker)
    }
}

/// Web application primary group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryGroupConfig {
    /// Table. With key-value storage the key column and key name are set.
    pub binding: TableBinding,
    /// Column holding the group ID.
    pub group_id_column: String,
}

/// Web application secondary groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondaryGroupConfig {
    /// Table. For key storage methods the key column and key name are set.
    pub binding: TableBinding,
    /// Column holding the group ID(s).
    pub group_id_column: String,
    /// Storage layout.
    pub storage: SecondaryGroupStorage,
    /// Delimiter for packed ID lists.
    pub delimiter: String,
}

/// Two-way group synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleSyncConfig {
    /// Web application user ID that performs group changes.
    pub super_user_id: String,
    /// Which side wins.
    pub direction: SyncDirection,
    /// Which side wins on a player's first synchronization.
    pub first_direction: SyncDirection,
    /// Tell players when their primary group changes.
    pub primary_group_notify: bool,
    /// Web application group ID to permissions group name, in document order.
    pub group_mapping: Vec<(String, String)>,
    /// Permission groups treated as a primary group, in priority order.
    pub groups_treated_as_primary: Vec<String>,
}

/// Ban synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanSyncConfig {
    /// How bans are recorded.
    pub method: BanMethod,
    /// Web application group IDs that mean "banned".
    pub group_ids: Vec<String>,
    /// Ban table, for [`BanMethod::Table`].
    pub binding: TableBinding,
    /// Column holding the ban reason.
    pub reason_column: String,
    /// Column holding the ban start time.
    pub start_time_column: String,
    /// Column holding the ban end time.
    pub end_time_column: String,
}

/// The bridge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    general: GeneralConfig,
    database: DatabaseConfig,
    linking: LinkingConfig,
    avatar: AvatarConfig,
    post_count: PostCountConfig,
    statistics: StatisticsConfig,
    primary_group: PrimaryGroupConfig,
    secondary_group: SecondaryGroupConfig,
    simple_sync: SimpleSyncConfig,
    ban_sync: BanSyncConfig,
    data_folder: PathBuf,
    flags: FeatureFlags,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfigBuilder::new().build()
    }
}

impl BridgeConfig {
    /// Loads configuration from a document, using the current directory as
    /// the data folder.
    ///
    /// The log level is applied before any other key is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a key holds a value of the wrong type.
    pub fn load(document: &ConfigDocument) -> Result<Self> {
        Ok(BridgeConfigBuilder::from_document(document)?.build())
    }

    /// Loads configuration from a file. The file's directory becomes the
    /// data folder, so the player cache lives next to the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let document = ConfigDocument::from_path(path)?;
        let data_folder = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(BridgeConfigBuilder::from_document(&document)?
            .data_folder(data_folder)
            .build())
    }

    /// Writes the default configuration document if `path` does not exist.
    ///
    /// Returns `true` if a file was written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file or its directory cannot be created.
    pub fn save_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Io {
                operation: "create_config_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        std::fs::write(path, DEFAULT_CONFIG).map_err(|e| Error::Io {
            operation: "write_default_config".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(true)
    }

    /// Returns the platform configuration file location, if a home
    /// directory can be determined.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "communitybridge", "community-bridge")
            .map(|dirs| dirs.config_dir().join("config.yml"))
    }

    /// General settings.
    #[must_use]
    pub const fn general(&self) -> &GeneralConfig {
        &self.general
    }

    /// Database connection settings.
    #[must_use]
    pub const fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    /// Linking settings.
    #[must_use]
    pub const fn linking(&self) -> &LinkingConfig {
        &self.linking
    }

    /// Avatar settings.
    #[must_use]
    pub const fn avatar(&self) -> &AvatarConfig {
        &self.avatar
    }

    /// Post count settings.
    #[must_use]
    pub const fn post_count(&self) -> &PostCountConfig {
        &self.post_count
    }

    /// Statistics settings.
    #[must_use]
    pub const fn statistics(&self) -> &StatisticsConfig {
        &self.statistics
    }

    /// Primary group settings.
    #[must_use]
    pub const fn primary_group(&self) -> &PrimaryGroupConfig {
        &self.primary_group
    }

    /// Secondary group settings.
    #[must_use]
    pub const fn secondary_group(&self) -> &SecondaryGroupConfig {
        &self.secondary_group
    }

    /// Simple synchronization settings.
    #[must_use]
    pub const fn simple_sync(&self) -> &SimpleSyncConfig {
        &self.simple_sync
    }

    /// Ban synchronization settings.
    #[must_use]
    pub const fn ban_sync(&self) -> &BanSyncConfig {
        &self.ban_sync
    }

    /// Current feature flags.
    #[must_use]
    pub const fn flags(&self) -> FeatureFlags {
        self.flags
    }

    /// Folder holding the configuration and player cache.
    #[must_use]
    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Directory holding one cache record per player.
    #[must_use]
    pub fn cache_directory(&self) -> PathBuf {
        self.data_folder.join(CACHE_DIRECTORY_NAME)
    }

    /// Group for unregistered players, unless permission features are off.
    #[must_use]
    pub fn unregistered_group(&self) -> Option<&str> {
        Some(self.linking.unregistered_group.as_str())
            .filter(|_| self.flags.linking_unregistered_group)
    }

    /// Group for registered players, unless permission features are off.
    #[must_use]
    pub fn registered_group(&self) -> Option<&str> {
        Some(self.linking.registered_group.as_str())
            .filter(|_| self.flags.linking_registered_group)
    }

    /// Formatted companion for a tracker, if configured and still in use.
    #[must_use]
    pub fn formatted_tracker_name(&self, tracker: Tracker) -> Option<&str> {
        if !self.flags.trackers.has_formatted(tracker) {
            return None;
        }
        self.statistics
            .tracker(tracker)
            .and_then(TrackerBinding::formatted_name)
    }

    /// Looks up the permissions group mapped to a web application group ID.
    #[must_use]
    pub fn group_name_for_id(&self, group_id: &str) -> Option<&str> {
        self.simple_sync
            .group_mapping
            .iter()
            .find(|(id, _)| id == group_id)
            .map(|(_, name)| name.as_str())
    }

    /// Looks up the web application group ID mapped to a permissions group,
    /// ignoring case.
    #[must_use]
    pub fn group_id_for_name(&self, group_name: &str) -> Option<&str> {
        self.simple_sync
            .group_mapping
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(group_name))
            .map(|(id, _)| id.as_str())
    }

    /// Keeps only the features enabled in both the current flags and
    /// `flags`. Returns the resulting flags.
    pub fn narrow(&mut self, flags: FeatureFlags) -> FeatureFlags {
        let before = self.flags;
        self.flags = before.intersect(flags);
        if self.flags != before {
            tracing::debug!(before = ?before, after = ?self.flags, "Feature flags narrowed");
        }
        self.flags
    }

    /// Turns off wallet handling when the host has no economy engine.
    pub fn disable_economy(&mut self) {
        let mut flags = self.flags;
        flags.economy = false;
        self.narrow(flags);
    }

    /// Turns off every feature that needs a permissions system.
    pub fn disable_permission_features(&mut self) {
        let mut flags = self.flags;
        flags.simple_synchronization = false;
        flags.linking_unregistered_group = false;
        flags.linking_registered_group = false;
        self.narrow(flags);
        tracing::warn!("No permissions system available; group features disabled");
    }

    /// Echoes the effective configuration at config level and returns the
    /// lines. The database password is never included.
    pub fn report(&self) -> Vec<String> {
        let lines = report_lines(self);
        for line in &lines {
            tracing::debug!(target: "community_bridge::config", "{line}");
        }
        lines
    }
}

/// Builds a [`BridgeConfig`].
///
/// Section setters enable their feature; everything starts disabled.
#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    general: GeneralConfig,
    database: DatabaseConfig,
    linking: LinkingConfig,
    avatar: Option<AvatarConfig>,
    require_avatar: bool,
    post_count: Option<PostCountConfig>,
    require_minimum_posts: bool,
    statistics: Option<StatisticsConfig>,
    primary_group: Option<PrimaryGroupConfig>,
    secondary_group: Option<SecondaryGroupConfig>,
    simple_sync: Option<SimpleSyncConfig>,
    groups_treated_as_primary: Vec<String>,
    ban_sync: Option<BanSyncConfig>,
    economy: bool,
    data_folder: PathBuf,
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfigBuilder {
    /// Creates a builder with every feature disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            general: GeneralConfig::default(),
            database: DatabaseConfig::default(),
            linking: LinkingConfig::default(),
            avatar: None,
            require_avatar: false,
            post_count: None,
            require_minimum_posts: false,
            statistics: None,
            primary_group: None,
            secondary_group: None,
            simple_sync: None,
            groups_treated_as_primary: Vec::new(),
            ban_sync: None,
            economy: false,
            data_folder: PathBuf::from("."),
        }
    }

    /// Sets the general settings.
    #[must_use]
    pub fn general(mut self, general: GeneralConfig) -> Self {
        self.general = general;
        self
    }

    /// Sets the database settings.
    #[must_use]
    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// Sets the linking settings.
    #[must_use]
    pub fn linking(mut self, linking: LinkingConfig) -> Self {
        self.linking = linking;
        self
    }

    /// Enables avatar lookup.
    #[must_use]
    pub fn avatar(mut self, avatar: AvatarConfig) -> Self {
        self.avatar = Some(avatar);
        self
    }

    /// Requires players to have an avatar. Ignored without avatar lookup.
    #[must_use]
    pub const fn require_avatar(mut self, required: bool) -> Self {
        self.require_avatar = required;
        self
    }

    /// Enables post count lookup.
    #[must_use]
    pub fn post_count(mut self, post_count: PostCountConfig) -> Self {
        self.post_count = Some(post_count);
        self
    }

    /// Requires a minimum post count. Ignored without post count lookup.
    #[must_use]
    pub const fn require_minimum_posts(mut self, required: bool) -> Self {
        self.require_minimum_posts = required;
        self
    }

    /// Enables statistics tracking. Trackers present in
    /// [`StatisticsConfig::trackers`] are enabled.
    #[must_use]
    pub fn statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Enables the web application primary group.
    #[must_use]
    pub fn primary_group(mut self, primary: PrimaryGroupConfig) -> Self {
        self.primary_group = Some(primary);
        self
    }

    /// Enables web application secondary groups.
    #[must_use]
    pub fn secondary_group(mut self, secondary: SecondaryGroupConfig) -> Self {
        self.secondary_group = Some(secondary);
        self
    }

    /// Enables simple synchronization.
    #[must_use]
    pub fn simple_sync(mut self, simple_sync: SimpleSyncConfig) -> Self {
        self.simple_sync = Some(simple_sync);
        self
    }

    /// Enables ban synchronization.
    #[must_use]
    pub fn ban_sync(mut self, ban_sync: BanSyncConfig) -> Self {
        self.ban_sync = Some(ban_sync);
        self
    }

    /// Marks an economy engine as wanted.
    #[must_use]
    pub const fn economy(mut self, enabled: bool) -> Self {
        self.economy = enabled;
        self
    }

    /// Sets the folder holding the player cache.
    #[must_use]
    pub fn data_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.data_folder = folder.into();
        self
    }

    /// Reads every section from a document.
    ///
    /// `general.log-level` is read and applied first. For each feature the
    /// `enabled` key is read before anything else and the feature's other
    /// keys are only read when it is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a key holds a value of the wrong type.
    pub fn from_document(doc: &ConfigDocument) -> Result<Self> {
        let level_name = doc.get_string("general.log-level", "config")?;
        let log_level = LogLevel::parse(&level_name).unwrap_or_else(|| {
            tracing::warn!(level = %level_name, "Unknown log level, using 'config'");
            LogLevel::Config
        });
        observability::set_log_level(log_level);

        for section in doc.keys() {
            if !KNOWN_SECTIONS.contains(&section.as_str()) {
                tracing::warn!(section = %section, "Ignoring unknown configuration section");
            }
        }

        let general = read_general(doc, log_level)?;
        let economy = general.use_achievements;
        let mut builder = Self::new()
            .general(general)
            .database(read_database(doc)?)
            .linking(read_linking(doc)?);

        if doc.get_bool("app-avatar-config.enabled", false)? {
            builder.avatar = Some(AvatarConfig {
                binding: TableBinding::new(
                    doc.get_string("app-avatar-config.table-name", "")?,
                    doc.get_string("app-avatar-config.user-id-column", "")?,
                ),
                avatar_column: doc.get_string("app-avatar-config.avatar-column", "")?,
            });
        }

        if doc.get_bool("app-post-count-config.enabled", false)? {
            builder.post_count = Some(PostCountConfig {
                binding: TableBinding::new(
                    doc.get_string("app-post-count-config.table-name", "")?,
                    doc.get_string("app-post-count-config.user-id-column", "")?,
                ),
                post_count_column: doc
                    .get_string("app-post-count-config.post-count-column", "")?,
                minimum_posts: doc.get_int("requirement.post-count.minimum", 0)?,
            });
        }

        builder.require_avatar = doc.get_bool("requirement.avatar", false)?;
        builder.require_minimum_posts = doc.get_bool("requirement.post-count.enabled", false)?;

        if doc.get_bool("statistics.enabled", false)? {
            builder.statistics = read_statistics(doc)?;
        }
        let wallet_tracked = builder
            .statistics
            .as_ref()
            .is_some_and(|s| s.trackers.contains_key(&Tracker::Wallet));

        if doc.get_bool("app-group-config.primary.enabled", false)? {
            builder.primary_group = Some(read_primary_group(doc)?);
        }
        if doc.get_bool("app-group-config.secondary.enabled", false)? {
            builder.secondary_group = read_secondary_group(doc)?;
        }

        if doc.get_bool("simple-synchronization.enabled", false)? {
            builder.simple_sync = Some(read_simple_sync(doc)?);
        }
        builder.groups_treated_as_primary =
            doc.get_string_list("simple-synchronization.groups-treated-as-primary")?;

        if doc.get_bool("ban-synchronization.enabled", false)? {
            builder.ban_sync = read_ban_sync(doc)?;
        }

        builder.economy = economy || wallet_tracked;
        Ok(builder)
    }

    /// Builds the configuration, deriving the initial feature flags.
    #[must_use]
    pub fn build(self) -> BridgeConfig {
        let trackers = self.statistics.as_ref().map_or_else(TrackerFlags::default, |s| {
            s.trackers.iter().fold(TrackerFlags::default(), |flags, (tracker, binding)| {
                flags.with(*tracker, true, binding.formatted_name().is_some())
            })
        });

        let flags = FeatureFlags {
            avatar: self.avatar.is_some(),
            require_avatar: self.require_avatar && self.avatar.is_some(),
            post_count: self.post_count.is_some(),
            require_minimum_posts: self.require_minimum_posts && self.post_count.is_some(),
            statistics: self.statistics.is_some(),
            trackers,
            webapp_primary_group: self.primary_group.is_some(),
            webapp_secondary_group: self.secondary_group.is_some(),
            simple_synchronization: self.simple_sync.is_some(),
            ban_synchronization: self.ban_sync.is_some(),
            economy: self.economy || self.general.use_achievements,
            linking_unregistered_group: !self.linking.unregistered_group.is_empty(),
            linking_registered_group: !self.linking.registered_group.is_empty(),
        };

        let mut simple_sync = self.simple_sync.unwrap_or_default();
        if simple_sync.groups_treated_as_primary.is_empty() {
            simple_sync.groups_treated_as_primary = self.groups_treated_as_primary;
        }

        BridgeConfig {
            general: self.general,
            database: self.database,
            linking: self.linking,
            avatar: self.avatar.unwrap_or_default(),
            post_count: self.post_count.unwrap_or_default(),
            statistics: self.statistics.unwrap_or_default(),
            primary_group: self.primary_group.unwrap_or_default(),
            secondary_group: self.secondary_group.unwrap_or_default(),
            simple_sync,
            ban_sync: self.ban_sync.unwrap_or_default(),
            data_folder: self.data_folder,
            flags,
        }
    }
}

fn read_general(doc: &ConfigDocument, log_level: LogLevel) -> Result<GeneralConfig> {
    let defaults = GeneralConfig::default();
    Ok(GeneralConfig {
        log_level,
        plugin_metrics: doc.get_bool("general.plugin-metrics", defaults.plugin_metrics)?,
        use_achievements: doc.get_bool("general.use-achievements", defaults.use_achievements)?,
        permissions_system: doc.get_string("general.permissions-system", "")?,
        auto_every_unit: doc
            .get_string("general.auto-every-unit", &defaults.auto_every_unit)?
            .to_lowercase(),
        auto_sync: doc.get_bool("general.auto-sync", defaults.auto_sync)?,
        auto_sync_every: doc.get_long("general.auto-sync-every", defaults.auto_sync_every)?,
        sync_during_join: doc.get_bool("general.sync-during-join", defaults.sync_during_join)?,
        sync_during_quit: doc.get_bool("general.sync-during-quit", defaults.sync_during_quit)?,
        application_url: doc.get_string("general.application-url", &defaults.application_url)?,
        date_format: doc.get_string("general.date-format", &defaults.date_format)?,
    })
}

fn read_database(doc: &ConfigDocument) -> Result<DatabaseConfig> {
    Ok(DatabaseConfig {
        host: doc.get_string("database.hostname", "")?,
        port: doc.get_string("database.port", "")?,
        name: doc.get_string("database.name", "")?,
        username: doc.get_string("database.username", "")?,
        password: SecretString::from(doc.get_string("database.password", "")?),
    })
}

fn read_linking(doc: &ConfigDocument) -> Result<LinkingConfig> {
    const S: &str = "player-user-linking";
    let defaults = LinkingConfig::default();
    let key = |name: &str| format!("{S}.{name}");

    let mut binding = TableBinding::new(
        doc.get_string(&key("table-name"), "")?,
        doc.get_string(&key("user-id-column"), "")?,
    );
    if doc.get_bool(&key("uses-key"), false)? {
        binding = binding
            .with_key_column(doc.get_string(&key("key-column"), "")?)
            .with_value_column(doc.get_string(&key("value-column"), "")?)
            .with_key_name(doc.get_string(&key("key-name"), "")?);
    }

    Ok(LinkingConfig {
        binding,
        player_name_column: doc.get_string(&key("playername-column"), "")?,
        auto_remind: doc.get_bool(&key("auto-remind"), defaults.auto_remind)?,
        auto_remind_every: doc.get_long(&key("auto-remind-every"), defaults.auto_remind_every)?,
        notify_registered: doc
            .get_bool(&key("notify-registered-player"), defaults.notify_registered)?,
        notify_unregistered: doc
            .get_bool(&key("notify-unregistered-player"), defaults.notify_unregistered)?,
        kick_unregistered: doc.get_bool(&key("kick-unregistered"), defaults.kick_unregistered)?,
        unregistered_group: doc.get_string(&key("unregistered-player-group"), "")?,
        registered_group: doc.get_string(&key("registered-player-group"), "")?,
        notify_player_group: doc.get_bool(&key("notify-player-of-group"), false)?,
        registered_former_unregistered_only: doc
            .get_bool(&key("registered-former-unregistered-only"), false)?,
    })
}

/// Returns `None` when the insert method is unknown, which disables
/// statistics until the configuration is corrected.
fn read_statistics(doc: &ConfigDocument) -> Result<Option<StatisticsConfig>> {
    let uses_key = doc.get_bool("statistics.uses-key", false)?;
    let mut binding = TableBinding::new(
        doc.get_string("statistics.table-name", "")?,
        doc.get_string("statistics.user-id-column", "")?,
    );
    if uses_key {
        binding = binding
            .with_key_column(doc.get_string("statistics.key-column", "")?)
            .with_value_column(doc.get_string("statistics.value-column", "")?);
    }

    let insert = if doc.get_bool("statistics.insert.enabled", false)? {
        let method_name = doc.get_string("statistics.insert.method", "generic")?;
        let Some(method) = InsertMethod::parse(&method_name) else {
            tracing::error!(method = %method_name, "Invalid statistics insert method");
            tracing::error!("Disabling statistics until the problem is corrected");
            return Ok(None);
        };
        let defaults = StatisticsInsert::default();
        Some(StatisticsInsert {
            method,
            theme_id_column: doc
                .get_string("statistics.insert.theme-id-column", &defaults.theme_id_column)?,
            theme_id: doc.get_string("statistics.insert.theme-id", &defaults.theme_id)?,
        })
    } else {
        None
    };

    let mut trackers = BTreeMap::new();
    for tracker in Tracker::ALL {
        let base = format!("statistics.trackers.{}", tracker.config_key());
        if !doc.get_bool(&format!("{base}.enabled"), false)? {
            continue;
        }
        let name = doc.get_string(&format!("{base}.column-or-key-name"), "")?;
        let formatted = if tracker.has_formatted() {
            doc.get_string(&format!("{base}.formatted-column-or-key-name"), "")?
        } else {
            String::new()
        };
        trackers.insert(tracker, TrackerBinding::for_encoding(uses_key, name, formatted));
    }

    Ok(Some(StatisticsConfig {
        binding,
        insert,
        trackers,
        online_value: doc.get_string("statistics.trackers.online-status.online-value", "")?,
        offline_value: doc.get_string("statistics.trackers.online-status.offline-value", "")?,
    }))
}

fn read_primary_group(doc: &ConfigDocument) -> Result<PrimaryGroupConfig> {
    const S: &str = "app-group-config.primary";
    let mut binding = TableBinding::new(
        doc.get_string(&format!("{S}.table-name"), "")?,
        doc.get_string(&format!("{S}.user-id-column"), "")?,
    );
    if doc.get_bool(&format!("{S}.uses-key"), false)? {
        binding = binding
            .with_key_column(doc.get_string(&format!("{S}.key-column"), "")?)
            .with_key_name(doc.get_string(&format!("{S}.key-name"), "")?);
    }
    Ok(PrimaryGroupConfig {
        binding,
        group_id_column: doc.get_string(&format!("{S}.group-id-column"), "")?,
    })
}

/// Returns `None` when the storage method is unknown.
fn read_secondary_group(doc: &ConfigDocument) -> Result<Option<SecondaryGroupConfig>> {
    const S: &str = "app-group-config.secondary";
    let method_name = doc.get_string(&format!("{S}.storage-method"), "junction")?;
    let Some(storage) = SecondaryGroupStorage::parse(&method_name) else {
        tracing::error!(method = %method_name, "Invalid secondary group storage method");
        tracing::error!("Disabling secondary groups until the problem is corrected");
        return Ok(None);
    };

    let mut binding = TableBinding::new(
        doc.get_string(&format!("{S}.table-name"), "")?,
        doc.get_string(&format!("{S}.user-id-column"), "")?,
    );
    if storage.uses_key() {
        binding = binding
            .with_key_column(doc.get_string(&format!("{S}.key-column"), "")?)
            .with_key_name(doc.get_string(&format!("{S}.key-name"), "")?);
    }

    Ok(Some(SecondaryGroupConfig {
        binding,
        group_id_column: doc.get_string(&format!("{S}.group-id-column"), "")?,
        storage,
        delimiter: doc.get_string(&format!("{S}.group-id-delimiter"), "")?,
    }))
}

fn read_simple_sync(doc: &ConfigDocument) -> Result<SimpleSyncConfig> {
    const S: &str = "simple-synchronization";
    let direction = |key: &str| -> Result<SyncDirection> {
        let name = doc.get_string(&format!("{S}.{key}"), "two-way")?;
        Ok(SyncDirection::parse(&name).unwrap_or_else(|| {
            tracing::warn!(setting = %key, value = %name, "Unknown synchronization direction, using two-way");
            SyncDirection::TwoWay
        }))
    };

    Ok(SimpleSyncConfig {
        super_user_id: doc.get_string(&format!("{S}.super-user-user-id"), "")?,
        direction: direction("direction")?,
        first_direction: direction("first-direction")?,
        primary_group_notify: doc.get_bool(&format!("{S}.primary-group-change-notify"), false)?,
        group_mapping: doc.get_string_map(&format!("{S}.group-mapping"))?,
        groups_treated_as_primary: doc
            .get_string_list(&format!("{S}.groups-treated-as-primary"))?,
    })
}

/// Returns `None` when the ban method is unknown.
fn read_ban_sync(doc: &ConfigDocument) -> Result<Option<BanSyncConfig>> {
    const S: &str = "ban-synchronization";
    let method_name = doc.get_string(&format!("{S}.method"), "table")?;
    let Some(method) = BanMethod::parse(&method_name) else {
        tracing::error!(method = %method_name, "Invalid ban synchronization method");
        tracing::error!("Disabling ban synchronization until the problem is corrected");
        return Ok(None);
    };

    Ok(Some(BanSyncConfig {
        method,
        group_ids: doc.get_string_list(&format!("{S}.ban-group-ids"))?,
        binding: TableBinding::new(
            doc.get_string(&format!("{S}.table"), "")?,
            doc.get_string(&format!("{S}.banned-user-id-column"), "")?,
        ),
        reason_column: doc.get_string(&format!("{S}.ban-reason-column"), "")?,
        start_time_column: doc.get_string(&format!("{S}.ban-start-column"), "")?,
        end_time_column: doc.get_string(&format!("{S}.ban-end-column"), "")?,
    }))
}

fn report_lines(config: &BridgeConfig) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = |label: &str, value: &dyn std::fmt::Display| {
        lines.push(format!("{label:<37}: {value}"));
    };
    let flags = config.flags;
    let general = &config.general;

    line("Log level", &general.log_level);
    line("Plugin metrics enabled", &general.plugin_metrics);
    line("Use achievements", &general.use_achievements);
    line("Permissions system", &general.permissions_system);
    line("Economy enabled", &flags.economy);
    line("Autosync", &general.auto_sync);
    if general.auto_sync {
        line(
            "Autosync every",
            &format!("{} {}", general.auto_sync_every, general.auto_every_unit),
        );
    }
    line("Synchronize during join event", &general.sync_during_join);
    line("Synchronize during quit event", &general.sync_during_quit);
    line("Application url", &general.application_url);
    line("Date format", &general.date_format);

    let database = &config.database;
    line("Database hostname", &database.host);
    line("Database port", &database.port);
    line("Database name", &database.name);
    line("Database username", &database.username);

    let linking = &config.linking;
    line("Linking auto reminder", &linking.auto_remind);
    if linking.auto_remind {
        line(
            "Linking auto reminder every",
            &format!("{} {}", linking.auto_remind_every, general.auto_every_unit),
        );
    }
    line("Linking notify registered", &linking.notify_registered);
    line("Linking notify unregistered", &linking.notify_unregistered);
    line("Linking kick unregistered", &linking.kick_unregistered);
    line("Linking unregistered group", &config.unregistered_group().unwrap_or_default());
    line("Linking registered group", &config.registered_group().unwrap_or_default());
    line("Linking notify player of group", &linking.notify_player_group);
    line(
        "Linking reg former unregistered only",
        &linking.registered_former_unregistered_only,
    );
    line("Linking uses key-value pair", &linking.binding.uses_key());
    line("Linking table name", &linking.binding.table);
    line("Linking user ID column", &linking.binding.user_id_column);
    if linking.binding.uses_key() {
        line("Linking key-value pair key name", &linking.binding.key_name_or_empty());
        line("Linking key-value pair key column", &linking.binding.key_column_or_empty());
        line("Linking key-value pair value column", &linking.binding.value_column_or_empty());
    } else {
        line("Linking player name column", &linking.player_name_column);
    }

    line("Avatars config enabled", &flags.avatar);
    if flags.avatar {
        line("Avatar table name", &config.avatar.binding.table);
        line("Avatar user ID column", &config.avatar.binding.user_id_column);
        line("Avatar avatar column", &config.avatar.avatar_column);
    }

    line("Post count config enabled", &flags.post_count);
    if flags.post_count {
        line("Post count table name", &config.post_count.binding.table);
        line("Post count user ID column", &config.post_count.binding.user_id_column);
        line("Post count post count column", &config.post_count.post_count_column);
    }
    line("Require avatars", &flags.require_avatar);
    line("Require minimum posts", &flags.require_minimum_posts);
    if flags.require_minimum_posts {
        line("Require minimum post count", &config.post_count.minimum_posts);
    }

    line("Tracking statistics", &flags.statistics);
    if flags.statistics {
        let stats = &config.statistics;
        line("Tracking table name", &stats.binding.table);
        line("Tracking user ID column", &stats.binding.user_id_column);
        line("Tracking uses key", &stats.binding.uses_key());
        if stats.binding.uses_key() {
            line("Tracking key column", &stats.binding.key_column_or_empty());
            line("Tracking value column", &stats.binding.value_column_or_empty());
        }
        line("Tracking uses insert", &stats.insert.is_some());
        if let Some(insert) = &stats.insert {
            line("Tracking insert method", &format!("{:?}", insert.method).to_lowercase());
            line("Tracking insert theme column", &insert.theme_id_column);
            line("Tracking insert theme ID", &insert.theme_id);
        }
        for tracker in flags.trackers.enabled() {
            let name = stats.tracker(tracker).map_or("", TrackerBinding::name);
            line(&format!("Tracking {tracker} column/key"), &name);
            if let Some(formatted) = config.formatted_tracker_name(tracker) {
                line(&format!("Tracking {tracker} formatted co/key"), &formatted);
            }
        }
        if flags.trackers.is_enabled(Tracker::OnlineStatus) {
            line("Tracking online status online value", &stats.online_value);
            line("Tracking online status offline value", &stats.offline_value);
        }
    }

    if flags.webapp_primary_group {
        let primary = &config.primary_group;
        line("Primary group table", &primary.binding.table);
        line("Primary group user id column", &primary.binding.user_id_column);
        line("Primary group group id column", &primary.group_id_column);
        line("Primary group uses key", &primary.binding.uses_key());
        if primary.binding.uses_key() {
            line("Primary group key name", &primary.binding.key_name_or_empty());
            line("Primary group key column", &primary.binding.key_column_or_empty());
        }
    }

    if flags.webapp_secondary_group {
        let secondary = &config.secondary_group;
        line("Secondary group table", &secondary.binding.table);
        line("Secondary group user id column", &secondary.binding.user_id_column);
        line("Secondary group group id column", &secondary.group_id_column);
        line("Secondary group storage method", &secondary.storage.as_str());
        if secondary.storage.uses_delimiter() {
            line("Secondary group id delimiter", &secondary.delimiter);
        }
        if secondary.storage.uses_key() {
            line("Secondary group key name", &secondary.binding.key_name_or_empty());
            line("Secondary group key column", &secondary.binding.key_column_or_empty());
        }
    }

    line("Simple synchronization enabled", &flags.simple_synchronization);
    if flags.simple_synchronization {
        let sync = &config.simple_sync;
        line("Simple synchronization direction", &sync.direction.as_str());
        line("Simple synchronization notification", &sync.primary_group_notify);
        line(
            "Simple synchronization P-groups",
            &format!("{:?}", sync.groups_treated_as_primary),
        );
    }

    line("Ban synchronization enabled", &flags.ban_synchronization);
    if flags.ban_synchronization {
        let ban = &config.ban_sync;
        line("Ban synchronization method", &format!("{:?}", ban.method).to_lowercase());
        line("Ban synchronization group IDs", &format!("{:?}", ban.group_ids));
        line("Ban synchronization table name", &ban.binding.table);
        line("Ban synchronization user ID column", &ban.binding.user_id_column);
        line("Ban synchronization reason column", &ban.reason_column);
        line("Ban synchronization start time column", &ban.start_time_column);
        line("Ban synchronization end time column", &ban.end_time_column);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP_SYNC: &str = r"
general:
  log-level: warning
  auto-sync: true
database:
  password: hunter2
player-user-linking:
  table-name: phpbb_profile_fields_data
  user-id-column: user_id
  uses-key: false
  playername-column: pf_minecraft
  registered-player-group: Members
app-group-config:
  primary:
    enabled: true
    table-name: phpbb_users
    user-id-column: user_id
    group-id-column: group_id
  secondary:
    enabled: true
    table-name: phpbb_user_group
    user-id-column: user_id
    group-id-column: group_id
    storage-method: Junction
simple-synchronization:
  enabled: true
  super-user-user-id: '2'
  direction: web
  group-mapping:
    2: Members
    5: Admin
  groups-treated-as-primary: [Admin, Members]
";

    #[test]
    fn test_defaults_match_default_document() {
        let from_empty = BridgeConfig::load(&ConfigDocument::empty()).unwrap();
        let from_default =
            BridgeConfig::load(&ConfigDocument::from_yaml_str(DEFAULT_CONFIG).unwrap()).unwrap();
        assert_eq!(from_empty, from_default);
        assert_eq!(from_empty, BridgeConfig::default());
        assert_eq!(from_empty.flags(), FeatureFlags::none());
    }

    #[test]
    fn test_load_group_sync() {
        let doc = ConfigDocument::from_yaml_str(GROUP_SYNC).unwrap();
        let config = BridgeConfig::load(&doc).unwrap();
        let flags = config.flags();

        assert_eq!(config.general().log_level, LogLevel::Warning);
        assert!(flags.webapp_primary_group);
        assert!(flags.webapp_secondary_group);
        assert!(flags.simple_synchronization);
        assert!(flags.group_synchronization_active());
        assert!(flags.player_data_required());
        assert!(flags.permissions_system_required());
        assert!(!flags.economy);

        assert_eq!(config.secondary_group().storage, SecondaryGroupStorage::JunctionTable);
        assert_eq!(config.simple_sync().direction, SyncDirection::WebApplication);
        assert_eq!(config.simple_sync().first_direction, SyncDirection::TwoWay);
        assert_eq!(
            config.simple_sync().groups_treated_as_primary,
            vec!["Admin".to_string(), "Members".to_string()]
        );
        assert_eq!(config.registered_group(), Some("Members"));
        assert_eq!(config.cache_directory(), PathBuf::from("./Players"));
    }

    #[test]
    fn test_disabled_feature_keys_are_not_required() {
        // A malformed value under a disabled feature is never read.
        let doc = ConfigDocument::from_yaml_str(
            "app-avatar-config:\n  enabled: false\n  table-name: [not, a, string]\n",
        )
        .unwrap();
        let config = BridgeConfig::load(&doc).unwrap();
        assert!(!config.flags().avatar);
        assert_eq!(config.avatar(), &AvatarConfig::default());

        let doc = ConfigDocument::from_yaml_str(
            "app-avatar-config:\n  enabled: true\n  table-name: [not, a, string]\n",
        )
        .unwrap();
        assert!(matches!(BridgeConfig::load(&doc), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_requirements_follow_source_at_load() {
        let doc = ConfigDocument::from_yaml_str(
            "requirement:\n  avatar: true\n  post-count:\n    enabled: true\n    minimum: 5\n",
        )
        .unwrap();
        let flags = BridgeConfig::load(&doc).unwrap().flags();
        assert!(!flags.require_avatar);
        assert!(!flags.require_minimum_posts);
    }

    #[test]
    fn test_statistics_encodings_and_economy() {
        let doc = ConfigDocument::from_yaml_str(
            r"
statistics:
  enabled: true
  table-name: smf_themes
  user-id-column: id_member
  uses-key: true
  key-column: variable
  value-column: value
  trackers:
    wallet:
      enabled: true
      column-or-key-name: cb_wallet
    game-time:
      enabled: true
      column-or-key-name: cb_gametime
      formatted-column-or-key-name: cb_gametime_formatted
    level:
      enabled: false
      column-or-key-name: cb_level
",
        )
        .unwrap();
        let config = BridgeConfig::load(&doc).unwrap();
        let flags = config.flags();
        assert!(flags.statistics);
        assert!(flags.trackers.is_enabled(Tracker::Wallet));
        assert!(flags.trackers.is_enabled(Tracker::GameTime));
        assert!(!flags.trackers.is_enabled(Tracker::Level));
        assert!(flags.economy);
        assert!(flags.wallet_tracking());
        assert_eq!(
            config.statistics().tracker(Tracker::GameTime),
            Some(&TrackerBinding::KeyValue {
                key_name: "cb_gametime".to_string(),
                formatted_key_name: Some("cb_gametime_formatted".to_string()),
            })
        );
        assert_eq!(
            config.formatted_tracker_name(Tracker::GameTime),
            Some("cb_gametime_formatted")
        );
    }

    #[test]
    fn test_invalid_methods_disable_features() {
        let doc = ConfigDocument::from_yaml_str(
            r"
statistics:
  enabled: true
  insert:
    enabled: true
    method: phpbb
app-group-config:
  secondary:
    enabled: true
    storage-method: csv
ban-synchronization:
  enabled: true
  method: file
",
        )
        .unwrap();
        let flags = BridgeConfig::load(&doc).unwrap().flags();
        assert!(!flags.statistics);
        assert!(!flags.webapp_secondary_group);
        assert!(!flags.ban_synchronization);
    }

    #[test]
    fn test_group_mapping_lookups() {
        let doc = ConfigDocument::from_yaml_str(GROUP_SYNC).unwrap();
        let config = BridgeConfig::load(&doc).unwrap();
        assert_eq!(config.group_name_for_id("5"), Some("Admin"));
        assert_eq!(config.group_name_for_id("9"), None);
        assert_eq!(config.group_id_for_name("members"), Some("2"));
        assert_eq!(config.group_id_for_name("Guests"), None);
    }

    #[test]
    fn test_narrowing_is_monotonic() {
        let doc = ConfigDocument::from_yaml_str(GROUP_SYNC).unwrap();
        let mut config = BridgeConfig::load(&doc).unwrap();

        let mut off = config.flags();
        off.webapp_primary_group = false;
        off.webapp_secondary_group = false;
        config.narrow(off);
        assert!(!config.flags().group_synchronization_active());

        // Asking to re-enable has no effect.
        let mut on = config.flags();
        on.webapp_primary_group = true;
        on.economy = true;
        let after = config.narrow(on);
        assert!(!after.webapp_primary_group);
        assert!(!after.economy);
    }

    #[test]
    fn test_disable_permission_features() {
        let doc = ConfigDocument::from_yaml_str(GROUP_SYNC).unwrap();
        let mut config = BridgeConfig::load(&doc).unwrap();
        config.disable_permission_features();
        let flags = config.flags();
        assert!(!flags.simple_synchronization);
        assert!(!flags.group_synchronization_active());
        assert!(!flags.permissions_system_required());
        assert_eq!(config.registered_group(), None);
    }

    #[test]
    fn test_disable_economy() {
        let doc = ConfigDocument::from_yaml_str("general:\n  use-achievements: true\n").unwrap();
        let mut config = BridgeConfig::load(&doc).unwrap();
        assert!(config.flags().economy);
        config.disable_economy();
        assert!(!config.flags().economy);
    }

    #[test]
    fn test_report_never_includes_password() {
        let doc = ConfigDocument::from_yaml_str(GROUP_SYNC).unwrap();
        let config = BridgeConfig::load(&doc).unwrap();
        let lines = config.report();
        assert!(lines.iter().all(|l| !l.contains("hunter2")));
        assert!(lines.iter().any(|l| l.starts_with("Simple synchronization direction")
            && l.ends_with("web-application")));
        assert!(lines.iter().any(|l| l.starts_with("Autosync every")));
    }

    #[test]
    fn test_load_from_file_uses_parent_as_data_folder() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        assert!(BridgeConfig::save_default(&path).unwrap());
        assert!(!BridgeConfig::save_default(&path).unwrap());

        let config = BridgeConfig::load_from_file(&path).unwrap();
        assert_eq!(config.data_folder(), dir.path());
        assert_eq!(config.cache_directory(), dir.path().join("Players"));
    }
}
