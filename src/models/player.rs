//! Player identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who a player is, as seen by the game server and the web application.
///
/// The UUID is stable; the display name can change between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Stable identifier.
    pub unique_id: Uuid,
    /// Current display name.
    pub name: String,
    /// Linked web application user ID, if the player is registered.
    pub user_id: Option<String>,
}

impl PlayerIdentity {
    /// Creates an unlinked identity.
    #[must_use]
    pub fn new(unique_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            unique_id,
            name: name.into(),
            user_id: None,
        }
    }

    /// Sets the linked web application user ID.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Cache key derived from the UUID.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.unique_id.hyphenated().to_string()
    }

    /// Cache key used by records written before UUID keys.
    #[must_use]
    pub fn legacy_cache_key(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.unique_id)
    }
}
