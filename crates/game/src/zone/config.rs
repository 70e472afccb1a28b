use serde::{Deserialize, Serialize};

use crate::stats::PrimaryStats;

/// One NPC spawn table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcSpawnDef {
    pub position: [f32; 3],
    pub faction_id: u32,
    #[serde(default = "default_npc_speed")]
    pub move_speed: f32,
    #[serde(default)]
    pub primary_ability: Option<String>,
    #[serde(default)]
    pub stats: Option<PrimaryStats>,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay_ms: u64,
}

fn default_npc_speed() -> f32 {
    3.5
}

fn default_respawn_delay() -> u64 {
    crate::constants::NPC_RESPAWN_DELAY_MS
}

/// Persisted zone definition, loaded from JSON by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub zone_id: u32,
    pub name: String,
    #[serde(default = "default_player_faction")]
    pub player_faction_id: u32,
    pub spawn_points: Vec<[f32; 3]>,
    #[serde(default)]
    pub npcs: Vec<NpcSpawnDef>,
}

fn default_player_faction() -> u32 {
    1
}

impl ZoneDefinition {
    /// Minimal single-spawn definition, used by tests and the demo host.
    pub fn bare(zone_id: u32, name: &str) -> Self {
        Self {
            zone_id,
            name: name.to_string(),
            player_faction_id: default_player_faction(),
            spawn_points: vec![[0.0, 0.0, 0.0]],
            npcs: Vec::new(),
        }
    }
}
