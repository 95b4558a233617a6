//! Authorities the bridge reads player state from.
//!
//! Each trait is implemented by the host: the permissions plugin, the
//! economy plugin and the web application's database. [`memory`] has
//! in-memory implementations for tests and dry runs.

pub mod memory;

use crate::Result;
use crate::models::PlayerIdentity;

/// The game server's permissions system.
pub trait PermissionAuthority: Send + Sync {
    /// Returns `true` if the player belongs to `group`.
    fn is_member_of_group(&self, player: &PlayerIdentity, group: &str) -> Result<bool>;

    /// Returns the player's groups, in the order the system reports them.
    fn groups(&self, player: &PlayerIdentity) -> Result<Vec<String>>;

    /// Returns `true` if the system has a native notion of a primary group.
    fn supports_primary_groups(&self) -> bool;

    /// Returns the player's primary group, if the system supports one and
    /// the player has one.
    fn primary_group(&self, player: &PlayerIdentity) -> Result<Option<String>>;
}

/// The game server's economy.
pub trait EconomyEngine: Send + Sync {
    /// Returns the player's balance.
    fn balance(&self, player: &PlayerIdentity) -> Result<f64>;
}

/// User, group and wallet data held by the web application.
///
/// Methods take the web application's user ID, not the player.
pub trait WebApplicationAuthority: Send + Sync {
    /// Returns the user's primary group ID.
    fn user_primary_group_id(&self, user_id: &str) -> Result<Option<String>>;

    /// Returns the user's secondary group IDs.
    fn user_secondary_group_ids(&self, user_id: &str) -> Result<Vec<String>>;

    /// Returns the user's wallet balance.
    fn balance(&self, user_id: &str) -> Result<f64>;
}
