//! Player state reconciliation.
//!
//! For each connecting player a [`Snapshot`] is built from the cached record
//! and the live authorities, then saved so the synchronization pass can
//! compare the previous state with the current one.

use crate::authority::{EconomyEngine, PermissionAuthority, WebApplicationAuthority};
use crate::config::BridgeConfig;
use crate::models::{PlayerIdentity, Snapshot};
use crate::storage::CacheStore;
use std::sync::Arc;
use tracing::instrument;

/// Where a [`PlayerState`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// Constructed, nothing loaded.
    Empty,
    /// Hydrated from the cache, or fresh if nothing was cached.
    Loaded,
    /// Refreshed from the live authorities.
    Generated,
    /// Written to the cache.
    Saved,
    /// A save failed; the state should not be used for synchronization.
    Discarded,
}

/// A player's snapshot plus where it is in its lifecycle.
///
/// Cloning gives an independent copy; changing the copy's lists never
/// affects the original.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    identity: PlayerIdentity,
    snapshot: Snapshot,
    phase: PlayerPhase,
}

impl PlayerState {
    /// Creates an empty state for `identity`.
    #[must_use]
    pub fn new(identity: PlayerIdentity) -> Self {
        Self {
            identity,
            snapshot: Snapshot::default(),
            phase: PlayerPhase::Empty,
        }
    }

    /// The player.
    #[must_use]
    pub const fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// The current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Mutable access to the snapshot, for the synchronization pass.
    pub const fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    /// The lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// `true` if nothing was cached for this player.
    #[must_use]
    pub const fn is_new_file(&self) -> bool {
        self.snapshot.is_new_file
    }

    /// Consumes the state, returning the snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }
}

/// Builds, refreshes and saves player snapshots.
///
/// Safe to share across threads; different players never touch the same
/// cache record.
pub struct PlayerStateReconciler {
    config: Arc<BridgeConfig>,
    cache: Arc<dyn CacheStore>,
    permissions: Option<Arc<dyn PermissionAuthority>>,
    economy: Option<Arc<dyn EconomyEngine>>,
    web: Option<Arc<dyn WebApplicationAuthority>>,
}

impl PlayerStateReconciler {
    /// Creates a reconciler with no authorities attached.
    #[must_use]
    pub fn new(config: Arc<BridgeConfig>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            cache,
            permissions: None,
            economy: None,
            web: None,
        }
    }

    /// Attaches the permissions system.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionAuthority>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Attaches the economy engine.
    #[must_use]
    pub fn with_economy(mut self, economy: Arc<dyn EconomyEngine>) -> Self {
        self.economy = Some(economy);
        self
    }

    /// Attaches the web application.
    #[must_use]
    pub fn with_web_application(mut self, web: Arc<dyn WebApplicationAuthority>) -> Self {
        self.web = Some(web);
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Loads a player's cached snapshot.
    ///
    /// The UUID record is tried first, then a record stored under the
    /// display name. With neither present the snapshot is fresh and
    /// `is_new_file` is set. An unreadable record is logged and replaced by
    /// an empty, non-new snapshot. Never fails.
    #[instrument(skip(self), fields(operation = "reconcile.load", player = %identity.name))]
    pub fn load(&self, identity: PlayerIdentity) -> PlayerState {
        let keys = [identity.cache_key(), identity.legacy_cache_key().to_string()];
        let mut snapshot = Snapshot::new_file();
        let mut source = "new";

        for (key, label) in keys.iter().zip(["uuid", "legacy"]) {
            match self.cache.load(key) {
                Ok(Some(record)) => {
                    snapshot = Snapshot::from_record(&record);
                    source = label;
                    break;
                },
                Ok(None) => {},
                Err(e) => {
                    tracing::error!(
                        player = %identity,
                        key = %key,
                        error = %e,
                        "Unable to read cached player data"
                    );
                    snapshot = Snapshot::default();
                    source = "error";
                    break;
                },
            }
        }

        metrics::counter!("player_snapshots_loaded_total", "source" => source).increment(1);
        tracing::debug!(player = %identity, source, "Player snapshot loaded");
        PlayerState {
            identity,
            snapshot,
            phase: PlayerPhase::Loaded,
        }
    }

    /// Refreshes a snapshot from the live authorities.
    ///
    /// Wallets are read only when the economy and the wallet tracker are
    /// enabled. Groups are read only while group synchronization is active,
    /// secondary fields before the primary group name so that the
    /// groups-treated-as-primary fallback can take its pick from the list.
    /// A failing authority is logged and leaves its fields as they were.
    #[instrument(skip(self, state), fields(operation = "reconcile.generate", player = %state.identity.name))]
    pub fn generate(&self, state: &mut PlayerState) {
        if state.phase == PlayerPhase::Empty {
            tracing::debug!(player = %state.identity, "Generating a snapshot that was never loaded");
        }
        let flags = self.config.flags();
        let identity = &state.identity;
        let snapshot = &mut state.snapshot;
        let user_id = identity.user_id.as_deref();

        if flags.wallet_tracking() {
            if let Some(economy) = &self.economy {
                if let Some(balance) = logged(identity, "economy balance", economy.balance(identity)) {
                    snapshot.minecraft_wallet = balance;
                }
            }
            if let (Some(web), Some(user_id)) = (&self.web, user_id) {
                if let Some(balance) = logged(identity, "web application balance", web.balance(user_id)) {
                    snapshot.web_application_wallet = balance;
                }
            }
        }

        if flags.group_synchronization_active() {
            if flags.webapp_secondary_group {
                if let Some(permissions) = &self.permissions {
                    if let Some(groups) = logged(identity, "permission groups", permissions.groups(identity)) {
                        snapshot.permissions_group_names = groups;
                    }
                }
                if let (Some(web), Some(user_id)) = (&self.web, user_id) {
                    if let Some(ids) = logged(
                        identity,
                        "web application secondary groups",
                        web.user_secondary_group_ids(user_id),
                    ) {
                        snapshot.webapp_group_ids = ids;
                    }
                }
            }

            if flags.webapp_primary_group {
                if let Some(permissions) = &self.permissions {
                    if let Some(name) = self.primary_group_name(permissions.as_ref(), identity, snapshot) {
                        snapshot.permissions_primary_group_name = name;
                    }
                }
                if let (Some(web), Some(user_id)) = (&self.web, user_id) {
                    if let Some(id) = logged(
                        identity,
                        "web application primary group",
                        web.user_primary_group_id(user_id),
                    ) {
                        snapshot.webapp_primary_group_id = id.unwrap_or_default();
                    }
                }
            }
        }

        state.phase = PlayerPhase::Generated;
    }

    /// Resolves the primary group name. Without native primary groups the
    /// first configured groups-treated-as-primary entry the player belongs to
    /// wins, and is removed from the group name list.
    fn primary_group_name(
        &self,
        permissions: &dyn PermissionAuthority,
        identity: &PlayerIdentity,
        snapshot: &mut Snapshot,
    ) -> Option<String> {
        if permissions.supports_primary_groups() {
            return logged(identity, "primary group", permissions.primary_group(identity))
                .map(Option::unwrap_or_default);
        }

        let candidates = &self.config.simple_sync().groups_treated_as_primary;
        let names = &mut snapshot.permissions_group_names;
        let chosen = candidates
            .iter()
            .find_map(|candidate| names.iter().position(|n| n == candidate))
            .map(|index| names.remove(index));
        Some(chosen.unwrap_or_default())
    }

    /// Saves a snapshot under the player's UUID key.
    ///
    /// The display name is recorded as the last known name. On failure the
    /// error is logged, the state is marked [`PlayerPhase::Discarded`] and
    /// `false` is returned.
    #[instrument(skip(self, state), fields(operation = "reconcile.save", player = %state.identity.name))]
    pub fn save(&self, state: &mut PlayerState) -> bool {
        state.snapshot.last_known_name.clone_from(&state.identity.name);
        let key = state.identity.cache_key();
        match self.cache.save(&key, &state.snapshot.to_record()) {
            Ok(()) => {
                state.phase = PlayerPhase::Saved;
                metrics::counter!("player_snapshots_saved_total", "status" => "success").increment(1);
                true
            },
            Err(e) => {
                tracing::error!(
                    player = %state.identity,
                    error = %e,
                    "Unable to save player data"
                );
                state.phase = PlayerPhase::Discarded;
                metrics::counter!("player_snapshots_saved_total", "status" => "error").increment(1);
                false
            },
        }
    }
}

impl std::fmt::Debug for PlayerStateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStateReconciler")
            .field("permissions", &self.permissions.is_some())
            .field("economy", &self.economy.is_some())
            .field("web", &self.web.is_some())
            .finish_non_exhaustive()
    }
}

fn logged<T>(identity: &PlayerIdentity, what: &str, result: crate::Result<T>) -> Option<T> {
    result
        .map_err(|e| {
            tracing::warn!(player = %identity, error = %e, "Unable to read {what}");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::memory::{InMemoryEconomy, InMemoryPermissions, InMemoryWebApplication};
    use crate::config::{
        BridgeConfigBuilder, PrimaryGroupConfig, SecondaryGroupConfig, SimpleSyncConfig,
        StatisticsConfig, Tracker, TrackerBinding,
    };
    use crate::storage::FilesystemCacheStore;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn group_sync_config(treated_as_primary: &[&str]) -> BridgeConfig {
        BridgeConfigBuilder::new()
            .primary_group(PrimaryGroupConfig::default())
            .secondary_group(SecondaryGroupConfig::default())
            .simple_sync(SimpleSyncConfig {
                groups_treated_as_primary: treated_as_primary.iter().map(ToString::to_string).collect(),
                ..SimpleSyncConfig::default()
            })
            .build()
    }

    fn player() -> PlayerIdentity {
        PlayerIdentity::new(Uuid::new_v4(), "Steve").with_user_id("7")
    }

    #[test]
    fn test_fallback_primary_group_is_pruned() {
        let dir = TempDir::new().unwrap();
        let perms = Arc::new(InMemoryPermissions::new());
        let identity = player();
        perms.set_groups(identity.unique_id, &["vip", "member"]);

        let reconciler = PlayerStateReconciler::new(
            Arc::new(group_sync_config(&["vip"])),
            Arc::new(FilesystemCacheStore::new(dir.path())),
        )
        .with_permissions(perms);

        let mut state = reconciler.load(identity);
        assert!(state.is_new_file());
        reconciler.generate(&mut state);
        assert_eq!(state.snapshot().permissions_primary_group_name, "vip");
        assert_eq!(state.snapshot().permissions_group_names, vec!["member".to_string()]);
        assert_eq!(state.phase(), PlayerPhase::Generated);
    }

    #[test]
    fn test_fallback_follows_declared_order() {
        let dir = TempDir::new().unwrap();
        let perms = Arc::new(InMemoryPermissions::new());
        let identity = player();
        perms.set_groups(identity.unique_id, &["member", "admin", "vip"]);

        let reconciler = PlayerStateReconciler::new(
            Arc::new(group_sync_config(&["vip", "admin"])),
            Arc::new(FilesystemCacheStore::new(dir.path())),
        )
        .with_permissions(perms);

        let mut state = reconciler.load(identity);
        reconciler.generate(&mut state);
        assert_eq!(state.snapshot().permissions_primary_group_name, "vip");
        assert_eq!(
            state.snapshot().permissions_group_names,
            vec!["member".to_string(), "admin".to_string()]
        );
    }

    #[test]
    fn test_native_primary_group_leaves_list_alone() {
        let dir = TempDir::new().unwrap();
        let perms = Arc::new(InMemoryPermissions::with_primary_groups());
        let web = Arc::new(InMemoryWebApplication::new());
        let identity = player();
        perms.set_groups(identity.unique_id, &["vip", "member"]);
        perms.set_primary_group(identity.unique_id, "member");
        web.set_primary_group_id("7", "5");
        web.set_secondary_group_ids("7", &["2", "9"]);

        let reconciler = PlayerStateReconciler::new(
            Arc::new(group_sync_config(&["vip"])),
            Arc::new(FilesystemCacheStore::new(dir.path())),
        )
        .with_permissions(perms)
        .with_web_application(web);

        let mut state = reconciler.load(identity);
        reconciler.generate(&mut state);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.permissions_primary_group_name, "member");
        assert_eq!(snapshot.permissions_group_names, vec!["vip", "member"]);
        assert_eq!(snapshot.webapp_primary_group_id, "5");
        assert_eq!(snapshot.webapp_group_ids, vec!["2", "9"]);
    }

    #[test]
    fn test_wallets_need_economy_and_wallet_tracker() {
        let dir = TempDir::new().unwrap();
        let economy = Arc::new(InMemoryEconomy::new());
        let web = Arc::new(InMemoryWebApplication::new());
        let identity = player();
        economy.set_balance(identity.unique_id, 99.5);
        web.set_balance("7", 12.25);

        let stats = StatisticsConfig {
            trackers: [(
                Tracker::Wallet,
                TrackerBinding::for_encoding(false, "wallet".into(), String::new()),
            )]
            .into_iter()
            .collect(),
            ..StatisticsConfig::default()
        };

        let without_economy = BridgeConfigBuilder::new().statistics(stats.clone()).build();
        let mut config = without_economy.clone();
        config.disable_economy();
        let reconciler = PlayerStateReconciler::new(
            Arc::new(config),
            Arc::new(FilesystemCacheStore::new(dir.path())),
        )
        .with_economy(economy.clone())
        .with_web_application(web.clone());
        let mut state = reconciler.load(identity.clone());
        reconciler.generate(&mut state);
        assert!(state.snapshot().minecraft_wallet.abs() < f64::EPSILON);
        assert!(state.snapshot().web_application_wallet.abs() < f64::EPSILON);

        let with_economy = BridgeConfigBuilder::new().statistics(stats).economy(true).build();
        let reconciler = PlayerStateReconciler::new(
            Arc::new(with_economy),
            Arc::new(FilesystemCacheStore::new(dir.path())),
        )
        .with_economy(economy)
        .with_web_application(web);
        let mut state = reconciler.load(identity);
        reconciler.generate(&mut state);
        assert!((state.snapshot().minecraft_wallet - 99.5).abs() < f64::EPSILON);
        assert!((state.snapshot().web_application_wallet - 12.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_failure_discards() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("Players");
        std::fs::write(&blocker, "not a directory").unwrap();

        let reconciler = PlayerStateReconciler::new(
            Arc::new(group_sync_config(&[])),
            Arc::new(FilesystemCacheStore::new(&blocker)),
        );
        let mut state = reconciler.load(player());
        reconciler.generate(&mut state);
        assert!(!reconciler.save(&mut state));
        assert_eq!(state.phase(), PlayerPhase::Discarded);
    }

    #[test]
    fn test_save_records_last_known_name() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FilesystemCacheStore::new(dir.path()));
        let reconciler = PlayerStateReconciler::new(Arc::new(group_sync_config(&[])), cache.clone());
        let identity = player();

        let mut state = reconciler.load(identity.clone());
        assert!(reconciler.save(&mut state));
        assert_eq!(state.phase(), PlayerPhase::Saved);

        let reloaded = reconciler.load(identity);
        assert!(!reloaded.is_new_file());
        assert_eq!(reloaded.snapshot().last_known_name, "Steve");
        assert!(cache.exists(&reloaded.identity().cache_key()).unwrap());
    }
}
