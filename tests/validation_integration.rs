//! Integration tests for feature validation against an in-memory database.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::too_many_lines)]

use community_bridge::config::{BridgeConfigBuilder, ConfigDocument, Tracker};
use community_bridge::storage::{QueryPort, SqliteQueryPort};
use community_bridge::{BridgeConfig, Error, FeatureValidator, Result, Severity};
use rusqlite::Connection;
use tempfile::TempDir;
use test_case::test_case;

const SCHEMA: &str = "
    CREATE TABLE phpbb_users (user_id INTEGER, group_id INTEGER, user_avatar TEXT, user_posts INTEGER);
    CREATE TABLE phpbb_profile_fields_data (user_id INTEGER, pf_minecraft TEXT);
    CREATE TABLE phpbb_user_group (user_id INTEGER, group_id INTEGER);
    CREATE TABLE phpbb_banlist (ban_userid INTEGER, ban_reason TEXT, ban_start INTEGER, ban_end INTEGER);
    CREATE TABLE cb_stats (user_id INTEGER, online TEXT, last_online INTEGER, last_online_f TEXT,
                           game_time INTEGER, game_time_f TEXT, level INTEGER, wallet REAL);
    CREATE TABLE smf_themes (id_member INTEGER, id_theme INTEGER, variable TEXT, value TEXT);
    CREATE TABLE wp_usermeta (user_id INTEGER, meta_key TEXT, meta_value TEXT);
    INSERT INTO phpbb_profile_fields_data VALUES (2, 'Admin'), (3, 'Steve');
    INSERT INTO smf_themes VALUES (1, 1, 'cb_lastonline', '0');
    INSERT INTO wp_usermeta VALUES (3, 'minecraft_name', 'Steve');
    INSERT INTO wp_usermeta VALUES (3, 'forum_group', '4');
";

const LINKING: &str = "
player-user-linking:
  table-name: phpbb_profile_fields_data
  user-id-column: user_id
  playername-column: pf_minecraft
";

const GROUPS: &str = "
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
    storage-method: junction
simple-synchronization:
  enabled: true
  super-user-user-id: '2'
  groups-treated-as-primary: [vip]
";

fn database() -> SqliteQueryPort {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    SqliteQueryPort::from_connection(conn)
}

fn load(yaml: &str, dir: &TempDir) -> BridgeConfig {
    let doc = ConfigDocument::from_yaml_str(yaml).unwrap();
    BridgeConfigBuilder::from_document(&doc)
        .unwrap()
        .data_folder(dir.path())
        .build()
}

fn severe_messages(report: &community_bridge::ValidationReport) -> Vec<String> {
    report
        .entries_with(Severity::Severe)
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_complete_configuration_passes() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}{GROUPS}
app-avatar-config:
  enabled: true
  table-name: phpbb_users
  user-id-column: user_id
  avatar-column: user_avatar
app-post-count-config:
  enabled: true
  table-name: phpbb_users
  user-id-column: user_id
  post-count-column: user_posts
requirement:
  avatar: true
  post-count:
    enabled: true
    minimum: 5
ban-synchronization:
  enabled: true
  method: table
  table: phpbb_banlist
  banned-user-id-column: ban_userid
  ban-reason-column: ban_reason
  ban-start-column: ban_start
  ban-end-column: ban_end
"
    );
    let mut config = load(&yaml, &dir);
    let before = config.flags();

    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(report.passed(), "{:?}", report.entries());
    assert!(severe_messages(&report).is_empty());
    assert_eq!(config.flags(), before);
    assert!(report.disabled_features().is_empty());
    assert!(config.flags().group_synchronization_active());
    assert!(dir.path().join("Players").is_dir());
}

#[test]
fn test_missing_avatar_table_disables_avatar_and_requirement() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
app-avatar-config:
  enabled: true
  table-name: phpbb_avatars
  user-id-column: user_id
  avatar-column: avatar
requirement:
  avatar: true
"
    );
    let mut config = load(&yaml, &dir);
    assert!(config.flags().require_avatar);

    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!report.passed());
    assert!(!config.flags().avatar);
    assert!(!config.flags().require_avatar);
    let severe = severe_messages(&report);
    assert!(
        severe.iter().any(|m| m.contains("app-avatar-config.table-name") && m.contains("phpbb_avatars")),
        "{severe:?}"
    );
    assert!(report.disabled_features().contains(&"avatar".to_string()));
}

#[test]
fn test_missing_post_count_column_disables_post_count() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
app-post-count-config:
  enabled: true
  table-name: phpbb_users
  user-id-column: user_id
  post-count-column: posts
requirement:
  post-count:
    enabled: true
    minimum: 10
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!report.passed());
    assert!(!config.flags().post_count);
    assert!(!config.flags().require_minimum_posts);
    assert!(severe_messages(&report).iter().any(|m| m.contains("'posts'")));
}

#[test]
fn test_direct_column_trackers() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: cb_stats
  user-id-column: user_id
  trackers:
    online-status:
      enabled: true
      column-or-key-name: online
    last-online:
      enabled: true
      column-or-key-name: last_online
      formatted-column-or-key-name: last_online_formatted
    game-time:
      enabled: true
      column-or-key-name: game_time
      formatted-column-or-key-name: game_time_f
    level:
      enabled: true
      column-or-key-name: player_level
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    let trackers = config.flags().trackers;

    assert!(!report.passed());
    assert!(config.flags().statistics);
    assert!(trackers.is_enabled(Tracker::OnlineStatus));
    assert!(trackers.is_enabled(Tracker::LastOnline));
    assert!(!trackers.has_formatted(Tracker::LastOnline));
    assert!(trackers.is_enabled(Tracker::GameTime));
    assert!(trackers.has_formatted(Tracker::GameTime));
    assert!(!trackers.is_enabled(Tracker::Level));
    assert_eq!(config.formatted_tracker_name(Tracker::LastOnline), None);
    assert_eq!(config.formatted_tracker_name(Tracker::GameTime), Some("game_time_f"));
}

#[test]
fn test_game_time_follows_last_online() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: cb_stats
  user-id-column: user_id
  trackers:
    last-online:
      enabled: true
      column-or-key-name: last_seen
    game-time:
      enabled: true
      column-or-key-name: game_time
      formatted-column-or-key-name: game_time_f
    wallet:
      enabled: true
      column-or-key-name: wallet
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    let trackers = config.flags().trackers;

    assert!(!trackers.is_enabled(Tracker::LastOnline));
    assert!(!trackers.is_enabled(Tracker::GameTime));
    assert!(!trackers.has_formatted(Tracker::GameTime));
    assert!(trackers.is_enabled(Tracker::Wallet));
    assert!(config.flags().statistics);
    assert!(
        report
            .entries_with(Severity::Warning)
            .any(|e| e.message.contains("'game-time' requires 'last-online'"))
    );
}

#[test]
fn test_no_tracker_left_disables_statistics() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: cb_stats
  user-id-column: user_id
  trackers:
    health:
      enabled: true
      column-or-key-name: health
"
    );
    let mut config = load(&yaml, &dir);
    FeatureValidator::new().validate(&mut config, &database());
    assert!(!config.flags().statistics);
    assert!(!config.flags().trackers.any_enabled());
}

#[test]
fn test_key_value_statistics_only_warn_for_missing_keys() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: smf_themes
  user-id-column: id_member
  uses-key: true
  key-column: variable
  value-column: value
  insert:
    enabled: true
    method: smf
    theme-id-column: id_theme
    theme-id: '1'
  trackers:
    last-online:
      enabled: true
      column-or-key-name: cb_lastonline
    level:
      enabled: true
      column-or-key-name: cb_level
"
    );
    let mut config = load(&yaml, &dir);
    let before = config.flags();
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(report.passed(), "{:?}", report.entries());
    assert_eq!(config.flags(), before);
    let warnings: Vec<_> = report.entries_with(Severity::Warning).collect();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].message.contains("cb_level"));
}

#[test]
fn test_key_value_statistics_missing_value_column() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: smf_themes
  user-id-column: id_member
  uses-key: true
  key-column: variable
  value-column: val
  trackers:
    level:
      enabled: true
      column-or-key-name: cb_level
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(!report.passed());
    assert!(!config.flags().statistics);
}

#[test]
fn test_missing_statistics_table_clears_every_tracker() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "
general:
  use-achievements: true
{LINKING}
statistics:
  enabled: true
  table-name: missing_stats
  user-id-column: user_id
  trackers:
    last-online:
      enabled: true
      column-or-key-name: last_online
      formatted-column-or-key-name: last_online_f
    wallet:
      enabled: true
      column-or-key-name: wallet
"
    );
    let mut config = load(&yaml, &dir);
    assert!(config.flags().wallet_tracking());

    let report = FeatureValidator::new().validate(&mut config, &database());
    let flags = config.flags();

    assert!(!report.passed());
    assert!(!flags.statistics);
    assert!(!flags.trackers.any_enabled());
    assert!(!flags.trackers.has_formatted(Tracker::LastOnline));
    assert!(!flags.wallet_tracking());
    assert_eq!(config.formatted_tracker_name(Tracker::LastOnline), None);
    assert!(report.disabled_features().contains(&"tracker:wallet".to_string()));
}

#[test]
fn test_smf_insert_needs_theme_id_column() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
statistics:
  enabled: true
  table-name: smf_themes
  user-id-column: id_member
  uses-key: true
  key-column: variable
  value-column: value
  insert:
    enabled: true
    method: smf
    theme-id-column: theme
    theme-id: '1'
  trackers:
    last-online:
      enabled: true
      column-or-key-name: cb_lastonline
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!report.passed());
    let severe = severe_messages(&report);
    assert!(
        severe
            .iter()
            .any(|m| m.contains("statistics.insert.theme-id-column") && m.contains("'theme'")),
        "{severe:?}"
    );
    // The theme ID value is not looked up in a column that does not exist.
    assert_eq!(report.entries_with(Severity::Warning).count(), 0);
}

const KEYED_PRIMARY: &str = "
app-group-config:
  primary:
    enabled: true
    table-name: wp_usermeta
    user-id-column: user_id
    group-id-column: meta_value
    uses-key: true
    key-column: KEY_COLUMN
    key-name: KEY_NAME
";

#[test]
fn test_keyed_primary_group_passes_with_known_key() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{KEYED_PRIMARY}")
        .replace("KEY_COLUMN", "meta_key")
        .replace("KEY_NAME", "forum_group");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(report.passed(), "{:?}", report.entries());
    assert!(config.flags().webapp_primary_group);
    assert_eq!(report.entries_with(Severity::Warning).count(), 0);
}

#[test]
fn test_keyed_primary_group_unknown_key_only_warns() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{KEYED_PRIMARY}")
        .replace("KEY_COLUMN", "meta_key")
        .replace("KEY_NAME", "primary_group");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(report.passed());
    assert!(config.flags().webapp_primary_group);
    assert!(
        report
            .entries_with(Severity::Warning)
            .any(|e| e.message.contains("primary_group"))
    );
}

#[test]
fn test_keyed_primary_group_missing_key_column_disables() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{KEYED_PRIMARY}")
        .replace("KEY_COLUMN", "meta_name")
        .replace("KEY_NAME", "forum_group");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!report.passed());
    assert!(!config.flags().webapp_primary_group);
    assert!(
        severe_messages(&report)
            .iter()
            .any(|m| m.contains("app-group-config.primary.key-column") && m.contains("'meta_name'"))
    );
}

fn keyed_secondary(storage: &str, key_column: &str, key_name: &str) -> String {
    format!(
        "{LINKING}
app-group-config:
  secondary:
    enabled: true
    table-name: wp_usermeta
    user-id-column: user_id
    group-id-column: meta_value
    storage-method: {storage}
    key-column: {key_column}
    key-name: {key_name}
"
    )
}

#[test_case("key-value"; "single key per group")]
#[test_case("multiple-key-value"; "one row per group")]
fn test_keyed_secondary_group_checks_key(storage: &str) {
    let dir = TempDir::new().unwrap();

    let mut config = load(&keyed_secondary(storage, "meta_key", "forum_group"), &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(report.passed(), "{:?}", report.entries());
    assert!(config.flags().webapp_secondary_group);
    assert_eq!(report.entries_with(Severity::Warning).count(), 0);

    let mut config = load(&keyed_secondary(storage, "meta_key", "extra_groups"), &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(report.passed());
    assert!(config.flags().webapp_secondary_group);
    assert!(
        report
            .entries_with(Severity::Warning)
            .any(|e| e.message.contains("extra_groups"))
    );
}

#[test_case("key-value"; "single key per group")]
#[test_case("multiple-key-value"; "one row per group")]
fn test_keyed_secondary_group_missing_key_column_disables(storage: &str) {
    let dir = TempDir::new().unwrap();
    let mut config = load(&keyed_secondary(storage, "meta_name", "forum_group"), &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!report.passed());
    assert!(!config.flags().webapp_secondary_group);
    assert!(
        severe_messages(&report)
            .iter()
            .any(|m| m.contains("app-group-config.secondary.key-column"))
    );
}

#[test]
fn test_junction_secondary_group_ignores_key_settings() {
    let dir = TempDir::new().unwrap();
    let yaml = keyed_secondary("junction", "meta_name", "forum_group");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(report.passed(), "{:?}", report.entries());
    assert!(config.flags().webapp_secondary_group);
}

#[test]
fn test_key_value_linking_soft_check() {
    let dir = TempDir::new().unwrap();
    let yaml = "
player-user-linking:
  table-name: wp_usermeta
  user-id-column: user_id
  uses-key: true
  key-column: meta_key
  value-column: meta_value
  key-name: minecraft_username
";
    let mut config = load(yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(report.passed());
    assert!(
        report
            .entries_with(Severity::Warning)
            .any(|e| e.message.contains("minecraft_username"))
    );
}

#[test]
fn test_missing_linking_table_fails_without_disabling() {
    let dir = TempDir::new().unwrap();
    let yaml = "
player-user-linking:
  table-name: users
  user-id-column: id
  playername-column: name
";
    let mut config = load(yaml, &dir);
    let before = config.flags();
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(!report.passed());
    assert_eq!(config.flags(), before);
    // Columns are not checked once the table is missing.
    assert_eq!(severe_messages(&report).len(), 1);
}

#[test]
fn test_simple_sync_needs_a_web_group_source() {
    let dir = TempDir::new().unwrap();
    // Primary points at a missing column, secondary at a missing table.
    let yaml = format!("{LINKING}{GROUPS}")
        .replace("phpbb_user_group", "missing_groups")
        .replacen("group-id-column: group_id", "group-id-column: gid", 1);
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    let flags = config.flags();

    assert!(!flags.webapp_primary_group);
    assert!(!flags.webapp_secondary_group);
    assert!(!flags.simple_synchronization);
    assert!(!flags.group_synchronization_active());
    assert!(!flags.player_data_required());
    assert!(
        severe_messages(&report)
            .iter()
            .any(|m| m.contains("'simple-synchronization' requires"))
    );
    assert!(!dir.path().join("Players").exists());
}

#[test]
fn test_unknown_super_user_disables_simple_sync() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{GROUPS}").replace("super-user-user-id: '2'", "super-user-user-id: '99'");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());

    assert!(!config.flags().simple_synchronization);
    assert!(config.flags().webapp_primary_group);
    assert!(config.flags().webapp_secondary_group);
    assert!(severe_messages(&report).iter().any(|m| m.contains("'99'")));
}

#[test]
fn test_empty_super_user_disables_simple_sync() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{GROUPS}").replace("super-user-user-id: '2'", "super-user-user-id: ''");
    let mut config = load(&yaml, &dir);
    FeatureValidator::new().validate(&mut config, &database());
    assert!(!config.flags().simple_synchronization);
}

#[test]
fn test_ban_table_checked_as_a_unit() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
ban-synchronization:
  enabled: true
  method: table
  table: phpbb_banlist
  banned-user-id-column: ban_userid
  ban-reason-column: ban_reason
  ban-start-column: ban_start
  ban-end-column: ban_expires
"
    );
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(!config.flags().ban_synchronization);
    assert!(severe_messages(&report).iter().any(|m| m.contains("ban_expires")));

    let group_method = yaml.replace("method: table", "method: group");
    let mut config = load(&group_method, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    assert!(config.flags().ban_synchronization);
    assert!(report.passed());
}

#[test]
fn test_blocked_player_directory_disables_group_sync() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Players"), "in the way").unwrap();
    let yaml = format!("{LINKING}{GROUPS}");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &database());
    let flags = config.flags();

    assert!(!flags.simple_synchronization);
    assert!(!flags.webapp_primary_group);
    assert!(!flags.webapp_secondary_group);
    assert!(!severe_messages(&report).is_empty());
}

#[test]
fn test_validation_only_narrows_on_revalidation() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "{LINKING}
app-avatar-config:
  enabled: true
  table-name: phpbb_avatars
  user-id-column: user_id
  avatar-column: avatar
"
    );
    let mut config = load(&yaml, &dir);
    FeatureValidator::new().validate(&mut config, &database());
    assert!(!config.flags().avatar);

    // A database that now has the table cannot bring the feature back.
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch("CREATE TABLE phpbb_avatars (user_id INTEGER, avatar TEXT);")
        .unwrap();
    FeatureValidator::new().validate(&mut config, &SqliteQueryPort::from_connection(conn));
    assert!(!config.flags().avatar);
}

/// A database whose every query fails.
struct BrokenDatabase;

impl QueryPort for BrokenDatabase {
    fn table_exists(&self, _: &str) -> Result<bool> {
        Err(Error::OperationFailed {
            operation: "table_exists".to_string(),
            cause: "connection reset".to_string(),
        })
    }

    fn column_exists(&self, _: &str, _: &str) -> Result<bool> {
        Err(Error::OperationFailed {
            operation: "column_exists".to_string(),
            cause: "connection reset".to_string(),
        })
    }

    fn count_rows_with_value(&self, _: &str, _: &str, _: &str) -> Result<u64> {
        Err(Error::OperationFailed {
            operation: "count_rows_with_value".to_string(),
            cause: "connection reset".to_string(),
        })
    }
}

#[test]
fn test_query_errors_fail_hard_checks() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{LINKING}{GROUPS}");
    let mut config = load(&yaml, &dir);
    let report = FeatureValidator::new().validate(&mut config, &BrokenDatabase);
    let flags = config.flags();

    assert!(!report.passed());
    assert!(!flags.webapp_primary_group);
    assert!(!flags.webapp_secondary_group);
    assert!(!flags.simple_synchronization);
    assert!(severe_messages(&report).iter().all(|m| !m.is_empty()));
    assert!(severe_messages(&report).iter().any(|m| m.contains("connection reset")));
}

#[test]
fn test_default_configuration_validates_linking_only() {
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfigBuilder::new().data_folder(dir.path()).build();
    let report = FeatureValidator::new().validate(&mut config, &database());
    // The linking table name is empty by default.
    assert!(!report.passed());
    assert_eq!(config.flags(), community_bridge::FeatureFlags::none());
}
