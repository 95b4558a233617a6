//! In-memory authorities for testing.
//!
//! Data is keyed by player UUID (permissions, economy) or web application
//! user ID, and is not persisted.

use super::{EconomyEngine, PermissionAuthority, WebApplicationAuthority};
use crate::models::PlayerIdentity;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

fn lock_error(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "lock poisoned".to_string(),
    }
}

/// In-memory permissions system.
#[derive(Debug, Default)]
pub struct InMemoryPermissions {
    groups: RwLock<HashMap<Uuid, Vec<String>>>,
    primary: Option<RwLock<HashMap<Uuid, String>>>,
}

impl InMemoryPermissions {
    /// Creates a permissions system without primary groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a permissions system with native primary groups.
    #[must_use]
    pub fn with_primary_groups() -> Self {
        Self {
            primary: Some(RwLock::default()),
            ..Self::default()
        }
    }

    /// Replaces a player's groups.
    pub fn set_groups(&self, player: Uuid, groups: &[&str]) {
        if let Ok(mut map) = self.groups.write() {
            map.insert(player, groups.iter().map(ToString::to_string).collect());
        }
    }

    /// Sets a player's primary group. Ignored without primary group support.
    pub fn set_primary_group(&self, player: Uuid, group: &str) {
        if let Some(Ok(mut map)) = self.primary.as_ref().map(RwLock::write) {
            map.insert(player, group.to_string());
        }
    }
}

impl PermissionAuthority for InMemoryPermissions {
    fn is_member_of_group(&self, player: &PlayerIdentity, group: &str) -> Result<bool> {
        Ok(self.groups(player)?.iter().any(|g| g.eq_ignore_ascii_case(group)))
    }

    fn groups(&self, player: &PlayerIdentity) -> Result<Vec<String>> {
        let map = self.groups.read().map_err(|_| lock_error("permission_groups"))?;
        Ok(map.get(&player.unique_id).cloned().unwrap_or_default())
    }

    fn supports_primary_groups(&self) -> bool {
        self.primary.is_some()
    }

    fn primary_group(&self, player: &PlayerIdentity) -> Result<Option<String>> {
        let Some(primary) = &self.primary else {
            return Ok(None);
        };
        let map = primary.read().map_err(|_| lock_error("permission_primary_group"))?;
        Ok(map.get(&player.unique_id).cloned())
    }
}

/// In-memory economy.
#[derive(Debug, Default)]
pub struct InMemoryEconomy {
    balances: RwLock<HashMap<Uuid, f64>>,
}

impl InMemoryEconomy {
    /// Creates an economy where every balance is zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a player's balance.
    pub fn set_balance(&self, player: Uuid, balance: f64) {
        if let Ok(mut map) = self.balances.write() {
            map.insert(player, balance);
        }
    }
}

impl EconomyEngine for InMemoryEconomy {
    fn balance(&self, player: &PlayerIdentity) -> Result<f64> {
        let map = self.balances.read().map_err(|_| lock_error("economy_balance"))?;
        Ok(map.get(&player.unique_id).copied().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default)]
struct WebUser {
    primary_group_id: Option<String>,
    secondary_group_ids: Vec<String>,
    balance: f64,
}

/// In-memory web application.
#[derive(Debug, Default)]
pub struct InMemoryWebApplication {
    users: RwLock<HashMap<String, WebUser>>,
}

impl InMemoryWebApplication {
    /// Creates a web application with no users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, user_id: &str, f: impl FnOnce(&mut WebUser)) {
        if let Ok(mut map) = self.users.write() {
            f(map.entry(user_id.to_string()).or_default());
        }
    }

    /// Sets a user's primary group ID.
    pub fn set_primary_group_id(&self, user_id: &str, group_id: &str) {
        self.update(user_id, |u| u.primary_group_id = Some(group_id.to_string()));
    }

    /// Replaces a user's secondary group IDs.
    pub fn set_secondary_group_ids(&self, user_id: &str, group_ids: &[&str]) {
        self.update(user_id, |u| {
            u.secondary_group_ids = group_ids.iter().map(ToString::to_string).collect();
        });
    }

    /// Sets a user's wallet balance.
    pub fn set_balance(&self, user_id: &str, balance: f64) {
        self.update(user_id, |u| u.balance = balance);
    }

    fn user(&self, user_id: &str) -> Result<WebUser> {
        let map = self.users.read().map_err(|_| lock_error("webapp_user"))?;
        Ok(map.get(user_id).cloned().unwrap_or_default())
    }
}

impl WebApplicationAuthority for InMemoryWebApplication {
    fn user_primary_group_id(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.user(user_id)?.primary_group_id)
    }

    fn user_secondary_group_ids(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self.user(user_id)?.secondary_group_ids)
    }

    fn balance(&self, user_id: &str) -> Result<f64> {
        Ok(self.user(user_id)?.balance)
    }
}
