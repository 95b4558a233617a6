//! Data models for community-bridge.

mod player;
mod snapshot;

pub use player::PlayerIdentity;
pub use snapshot::{Snapshot, record_keys};
