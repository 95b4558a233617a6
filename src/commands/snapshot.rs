//! Snapshot command handler.

use super::load_config;
use community_bridge::storage::{CacheStore, FilesystemCacheStore};
use community_bridge::Snapshot;
use std::path::Path;
use uuid::Uuid;

/// Prints a player's cached snapshot.
///
/// `player` is a UUID or a display name; names find records written before
/// UUID keys. Returns `Ok(false)` when nothing is cached.
pub fn cmd_snapshot(config_path: &Path, player: &str, json: bool) -> anyhow::Result<bool> {
    let config = load_config(config_path)?;
    let store = FilesystemCacheStore::new(config.cache_directory());
    let key = Uuid::parse_str(player).map_or_else(|_| player.to_string(), |id| id.hyphenated().to_string());

    let Some(record) = store.load(&key)? else {
        eprintln!("No cached data for {player}");
        return Ok(false);
    };
    let snapshot = Snapshot::from_record(&record);

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(true);
    }

    println!("Player:                 {player}");
    println!("Last known name:        {}", snapshot.last_known_name);
    println!("Minecraft wallet:       {}", snapshot.minecraft_wallet);
    println!("Web application wallet: {}", snapshot.web_application_wallet);
    println!("Primary group:          {}", snapshot.permissions_primary_group_name);
    println!("Groups:                 {}", snapshot.permissions_group_names.join(", "));
    println!("Web primary group ID:   {}", snapshot.webapp_primary_group_id);
    println!("Web group IDs:          {}", snapshot.webapp_group_ids.join(", "));
    Ok(true)
}
