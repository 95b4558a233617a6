//! The ordered validation steps.
//!
//! Each step takes the flags produced by the previous one and returns them,
//! possibly narrowed. Steps never enable a flag.

use super::checker::Checker;
use crate::Error;
use crate::config::{BanMethod, BridgeConfig, FeatureFlags, InsertMethod, Tracker, TrackerBinding};
use crate::storage::FilesystemCacheStore;

/// A validation step.
pub type Step = fn(&mut Checker<'_>, &BridgeConfig, FeatureFlags) -> FeatureFlags;

/// Every step, in the order it runs.
pub const STEPS: [(&str, Step); 10] = [
    ("linking", linking),
    ("avatar", avatar),
    ("post_count", post_count),
    ("statistics", statistics),
    ("primary_group", primary_group),
    ("secondary_group", secondary_group),
    ("simple_sync_sources", simple_sync_sources),
    ("simple_sync_super_user", simple_sync_super_user),
    ("ban_sync", ban_sync),
    ("player_data", player_data),
];

fn dependency(feature: &str, requires: &str) -> String {
    Error::DependencyUnsatisfied {
        feature: feature.to_string(),
        requires: requires.to_string(),
    }
    .to_string()
}

/// Linking has no flag of its own; failures only fail the overall result.
fn linking(c: &mut Checker<'_>, config: &BridgeConfig, flags: FeatureFlags) -> FeatureFlags {
    const S: &str = "player-user-linking";
    let linking = config.linking();
    let b = &linking.binding;

    if !c.check_table(&format!("{S}.table-name"), &b.table) {
        return flags;
    }
    c.check_column(&format!("{S}.user-id-column"), &b.table, &b.user_id_column);
    if b.uses_key() {
        let key_column = b.key_column_or_empty();
        if c.check_column(&format!("{S}.key-column"), &b.table, key_column) {
            c.check_key(&format!("{S}.key-name"), &b.table, key_column, b.key_name_or_empty());
        }
        c.check_column(&format!("{S}.value-column"), &b.table, b.value_column_or_empty());
    } else {
        c.check_column(
            &format!("{S}.playername-column"),
            &b.table,
            &linking.player_name_column,
        );
    }
    flags
}

fn avatar(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if !flags.avatar {
        return flags;
    }
    let avatar = config.avatar();
    let b = &avatar.binding;
    let ok = c.check_table_columns(
        "app-avatar-config.table-name",
        &b.table,
        &[
            ("app-avatar-config.user-id-column", &b.user_id_column),
            ("app-avatar-config.avatar-column", &avatar.avatar_column),
        ],
    );
    if !ok {
        c.warn("Temporarily disabling avatar features due to previous errors");
        flags.avatar = false;
        flags.require_avatar = false;
    }
    flags
}

fn post_count(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if !flags.post_count {
        return flags;
    }
    let post_count = config.post_count();
    let b = &post_count.binding;
    let ok = c.check_table_columns(
        "app-post-count-config.table-name",
        &b.table,
        &[
            ("app-post-count-config.user-id-column", &b.user_id_column),
            ("app-post-count-config.post-count-column", &post_count.post_count_column),
        ],
    );
    if !ok {
        c.warn("Temporarily disabling features dependent on post count config due to previous errors");
        flags.post_count = false;
        flags.require_minimum_posts = false;
    }
    flags
}

fn statistics(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if !flags.statistics {
        return flags;
    }
    let stats = config.statistics();
    let b = &stats.binding;

    let base = c.check_table_columns(
        "statistics.table-name",
        &b.table,
        &[("statistics.user-id-column", &b.user_id_column)],
    );
    if !base {
        c.warn("Temporarily disabling statistics tracking due to previous errors");
        flags.statistics = false;
        return flags;
    }

    if let Some(insert) = stats.insert.as_ref().filter(|i| i.method == InsertMethod::Smf) {
        if c.check_column(
            "statistics.insert.theme-id-column",
            &b.table,
            &insert.theme_id_column,
        ) {
            c.check_key(
                "statistics.insert.theme-id",
                &b.table,
                &insert.theme_id_column,
                &insert.theme_id,
            );
        }
    }

    let mut trackers = flags.trackers;
    if b.uses_key() {
        let key_column = b.key_column_or_empty();
        let unit = [
            ("statistics.key-column", key_column),
            ("statistics.value-column", b.value_column_or_empty()),
        ]
        .into_iter()
        .fold(true, |ok, (setting, column)| c.check_column(setting, &b.table, column) && ok);
        if !unit {
            c.warn("Temporarily disabling statistics tracking due to previous errors");
            flags.statistics = false;
            return flags;
        }

        for tracker in flags.trackers.enabled() {
            if tracker == Tracker::GameTime && !trackers.is_enabled(Tracker::LastOnline) {
                c.warn(dependency("game-time", "last-online"));
                trackers = trackers.without(Tracker::GameTime);
                continue;
            }
            let Some(binding) = stats.tracker(tracker) else {
                continue;
            };
            let base = format!("statistics.trackers.{}", tracker.config_key());
            c.check_key(
                &format!("{base}.column-or-key-name"),
                &b.table,
                key_column,
                binding.name(),
            );
            if let Some(formatted) = binding.formatted_name().filter(|_| trackers.has_formatted(tracker)) {
                c.check_key(
                    &format!("{base}.formatted-column-or-key-name"),
                    &b.table,
                    key_column,
                    formatted,
                );
            }
        }
    } else {
        for tracker in flags.trackers.enabled() {
            if tracker == Tracker::GameTime && !trackers.is_enabled(Tracker::LastOnline) {
                c.warn(dependency("game-time", "last-online"));
                trackers = trackers.without(Tracker::GameTime);
                continue;
            }
            let base = format!("statistics.trackers.{}", tracker.config_key());
            let column = stats.tracker(tracker).map_or("", TrackerBinding::name);
            if !c.check_column(&format!("{base}.column-or-key-name"), &b.table, column) {
                trackers = trackers.without(tracker);
                continue;
            }
            let formatted = stats
                .tracker(tracker)
                .and_then(TrackerBinding::formatted_name)
                .filter(|_| trackers.has_formatted(tracker));
            if let Some(formatted) = formatted {
                if !c.check_column(
                    &format!("{base}.formatted-column-or-key-name"),
                    &b.table,
                    formatted,
                ) {
                    trackers = trackers.without_formatted(tracker);
                }
            }
        }
    }

    flags.trackers = trackers;
    if !trackers.any_enabled() {
        c.warn(
            "Statistics tracking is enabled, but none of the individual trackers are enabled; temporarily disabling statistics tracking",
        );
        flags.statistics = false;
    }
    flags
}

fn primary_group(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    const S: &str = "app-group-config.primary";
    if !flags.webapp_primary_group {
        return flags;
    }
    let primary = config.primary_group();
    let b = &primary.binding;
    let mut ok = c.check_table_columns(
        &format!("{S}.table-name"),
        &b.table,
        &[
            (&format!("{S}.user-id-column"), &b.user_id_column),
            (&format!("{S}.group-id-column"), &primary.group_id_column),
        ],
    );
    if ok && b.uses_key() {
        let key_column = b.key_column_or_empty();
        ok = c.check_column(&format!("{S}.key-column"), &b.table, key_column);
        if ok {
            c.check_key(&format!("{S}.key-name"), &b.table, key_column, b.key_name_or_empty());
        }
    }
    if !ok {
        c.warn("Web application primary group disabled due to prior errors");
        flags.webapp_primary_group = false;
    }
    flags
}

fn secondary_group(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    const S: &str = "app-group-config.secondary";
    if !flags.webapp_secondary_group {
        return flags;
    }
    let secondary = config.secondary_group();
    let b = &secondary.binding;
    let mut ok = c.check_table_columns(
        &format!("{S}.table-name"),
        &b.table,
        &[
            (&format!("{S}.user-id-column"), &b.user_id_column),
            (&format!("{S}.group-id-column"), &secondary.group_id_column),
        ],
    );
    if ok && secondary.storage.uses_key() {
        let key_column = b.key_column_or_empty();
        ok = c.check_column(&format!("{S}.key-column"), &b.table, key_column);
        if ok {
            c.check_key(&format!("{S}.key-name"), &b.table, key_column, b.key_name_or_empty());
        }
    }
    if !ok {
        c.warn("Web application secondary groups disabled due to prior errors");
        flags.webapp_secondary_group = false;
    }
    flags
}

fn simple_sync_sources(c: &mut Checker<'_>, _: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if flags.simple_synchronization && !flags.webapp_primary_group && !flags.webapp_secondary_group {
        c.severe(format!(
            "Simple synchronization disabled: {}",
            dependency("simple-synchronization", "app-group-config")
        ));
        flags.simple_synchronization = false;
    }
    flags
}

fn simple_sync_super_user(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if !flags.simple_synchronization {
        return flags;
    }
    let b = &config.linking().binding;
    if !c.check_super_user(&b.table, &b.user_id_column, &config.simple_sync().super_user_id) {
        c.severe("Simple synchronization disabled due to prior errors");
        flags.simple_synchronization = false;
    }
    flags
}

fn ban_sync(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    const S: &str = "ban-synchronization";
    let ban = config.ban_sync();
    if !flags.ban_synchronization || ban.method != BanMethod::Table {
        return flags;
    }
    let ok = c.check_table_columns(
        &format!("{S}.table"),
        &ban.binding.table,
        &[
            (&format!("{S}.banned-user-id-column"), &ban.binding.user_id_column),
            (&format!("{S}.ban-reason-column"), &ban.reason_column),
            (&format!("{S}.ban-start-column"), &ban.start_time_column),
            (&format!("{S}.ban-end-column"), &ban.end_time_column),
        ],
    );
    if !ok {
        c.severe("Temporarily disabling ban synchronization due to previous errors");
        flags.ban_synchronization = false;
    }
    flags
}

fn player_data(c: &mut Checker<'_>, config: &BridgeConfig, mut flags: FeatureFlags) -> FeatureFlags {
    if !flags.player_data_required() {
        return flags;
    }
    if let Err(e) = FilesystemCacheStore::new(config.cache_directory()).ensure_directory() {
        c.severe(format!("Unable to prepare the player data directory: {e}"));
        flags.simple_synchronization = false;
        flags.webapp_primary_group = false;
        flags.webapp_secondary_group = false;
    }
    flags
}
