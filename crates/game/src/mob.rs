use std::collections::HashMap;

use glam::Vec3;

use crate::aggro::AggroTable;
use crate::ai::{AbilityIntent, NpcAi};
use crate::movement::PlayerPending;
use crate::stats::{DerivedStats, PrimaryStats, Resources, StatsController};
use crate::status::StatusController;

pub type MobId = u64;

/// Cast, cooldown, and combat-timing gates for one mob. All times are
/// absolute server milliseconds; zero means "none".
#[derive(Debug, Clone, Default)]
pub struct AbilityState {
    pub cast_start_time_ms: u64,
    pub cast_end_time_ms: u64,
    pub cast_ability_id: String,
    pub cast_id: u64,
    pub gcd_start_time_ms: u64,
    pub gcd_end_time_ms: u64,
    pub internal_cooldown_end_time_ms: u64,
    pub last_hostile_action_time_ms: u64,
}

impl AbilityState {
    pub fn clear_cast(&mut self) {
        self.cast_start_time_ms = 0;
        self.cast_end_time_ms = 0;
        self.cast_ability_id.clear();
        self.cast_id = 0;
    }
}

#[derive(Debug)]
pub struct PlayerData {
    pub pending: PlayerPending,
    pub visible_targets: Vec<MobId>,
    pub selected_target: Option<MobId>,
}

impl PlayerData {
    pub fn new() -> Self {
        Self {
            pending: PlayerPending::new(),
            visible_targets: Vec::new(),
            selected_target: None,
        }
    }
}

impl Default for PlayerData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct NpcData {
    pub aggro: AggroTable,
    pub ai: NpcAi,
    pub ability_intent: Option<AbilityIntent>,
    pub primary_ability: Option<String>,
    pub spawn_position: Vec3,
    pub respawn_at_ms: Option<u64>,
}

impl NpcData {
    pub fn new(spawn_position: Vec3) -> Self {
        Self {
            aggro: AggroTable::new(),
            ai: NpcAi::new(),
            ability_intent: None,
            primary_ability: None,
            spawn_position,
            respawn_at_ms: None,
        }
    }
}

#[derive(Debug)]
pub enum MobKind {
    Player(PlayerData),
    Npc(NpcData),
}

#[derive(Debug)]
pub struct Mob {
    pub id: MobId,
    pub faction_id: u32,
    pub position: Vec3,
    pub facing_yaw: f32,
    pub velocity_y: f32,
    pub grounded: bool,
    pub move_speed: f32,
    pub base_stats: PrimaryStats,
    pub resources: Resources,
    pub ability_state: AbilityState,
    pub cooldowns: HashMap<String, u64>,
    pub in_combat: bool,
    pub statuses: StatusController,
    pub stats: StatsController,
    pub kind: MobKind,
}

impl Mob {
    pub fn player(id: MobId, faction_id: u32, position: Vec3) -> Self {
        Self::with_kind(id, faction_id, position, MobKind::Player(PlayerData::new()))
    }

    pub fn npc(id: MobId, faction_id: u32, position: Vec3) -> Self {
        Self::with_kind(id, faction_id, position, MobKind::Npc(NpcData::new(position)))
    }

    fn with_kind(id: MobId, faction_id: u32, position: Vec3, kind: MobKind) -> Self {
        let base_stats = PrimaryStats::default();
        let stats = StatsController::new(&base_stats);
        let resources = Resources::full(stats.derived());
        Self {
            id,
            faction_id,
            position,
            facing_yaw: 0.0,
            velocity_y: 0.0,
            grounded: true,
            move_speed: crate::constants::PLAYER_SPEED,
            base_stats,
            resources,
            ability_state: AbilityState::default(),
            cooldowns: HashMap::new(),
            in_combat: false,
            statuses: StatusController::new(),
            stats,
            kind,
        }
    }

    pub fn with_base_stats(mut self, base: PrimaryStats) -> Self {
        self.base_stats = base;
        self.stats = StatsController::new(&base);
        self.resources = Resources::full(self.stats.derived());
        self
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, MobKind::Player(_))
    }

    pub fn is_npc(&self) -> bool {
        matches!(self.kind, MobKind::Npc(_))
    }

    pub fn is_alive(&self) -> bool {
        self.resources.hp > 0.0
    }

    pub fn is_ally_of(&self, other: &Mob) -> bool {
        self.faction_id == other.faction_id
    }

    pub fn derived(&self) -> &DerivedStats {
        self.stats.derived()
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.kind {
            MobKind::Player(p) => Some(p),
            MobKind::Npc(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            MobKind::Player(p) => Some(p),
            MobKind::Npc(_) => None,
        }
    }

    pub fn as_npc(&self) -> Option<&NpcData> {
        match &self.kind {
            MobKind::Npc(n) => Some(n),
            MobKind::Player(_) => None,
        }
    }

    pub fn as_npc_mut(&mut self) -> Option<&mut NpcData> {
        match &mut self.kind {
            MobKind::Npc(n) => Some(n),
            MobKind::Player(_) => None,
        }
    }

    /// Recomputes derived stats when any status mutation happened since the
    /// last call, clamping current resources to the new maxima.
    pub fn refresh_stats(&mut self) {
        if self.statuses.take_changed() {
            self.stats.mark_dirty();
        }
        if self.stats.is_dirty() {
            self.stats.recompute(
                &self.base_stats,
                self.statuses.stat_modifiers(),
                &mut self.resources,
            );
        }
    }

    /// Applies a raw hp delta with the authoritative clamps.
    pub fn apply_hp_delta(&mut self, delta: f32) {
        let max = self.stats.derived().max_hp;
        self.resources.hp = (self.resources.hp + delta).clamp(0.0, max);
    }

    pub fn effective_move_speed(&self) -> f32 {
        self.move_speed * self.stats.derived().move_speed_factor
    }
}

/// Zone-owned mob collection. Iteration follows insertion order so per-phase
/// processing stays deterministic across runs.
#[derive(Debug, Default)]
pub struct Mobs {
    by_id: HashMap<MobId, Mob>,
    order: Vec<MobId>,
}

impl Mobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mob: Mob) {
        if !self.by_id.contains_key(&mob.id) {
            self.order.push(mob.id);
        }
        self.by_id.insert(mob.id, mob);
    }

    pub fn remove(&mut self, id: MobId) -> Option<Mob> {
        let removed = self.by_id.remove(&id);
        if removed.is_some() {
            self.order.retain(|&o| o != id);
        }
        removed
    }

    pub fn contains(&self, id: MobId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: MobId) -> Option<&Mob> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: MobId) -> Option<&mut Mob> {
        self.by_id.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<MobId> {
        self.order.clone()
    }

    pub fn player_ids(&self) -> Vec<MobId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.by_id.get(&id).is_some_and(Mob::is_player))
            .collect()
    }

    pub fn npc_ids(&self) -> Vec<MobId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.by_id.get(&id).is_some_and(Mob::is_npc))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mob> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}
