use rkyv::{Archive, Deserialize, Serialize};

use crate::mob::MobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum EventCategory {
    Combat,
    Movement,
    Lifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum InterruptReason {
    Movement,
    Manual,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum ExitCombatReason {
    Timeout,
    Death,
}

/// Outcome of one ability effect on one target, as replicated to clients.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum EffectOutcome {
    Damage { amount: f32 },
    Heal { amount: f32 },
    Status { status_id: String },
    NoEffect,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum GameEvent {
    AbilityCastStart {
        cast_id: u64,
        actor_id: MobId,
        ability_id: String,
        cast_start_time_ms: u64,
        cast_end_time_ms: u64,
        gcd_start_time_ms: Option<u64>,
        gcd_end_time_ms: Option<u64>,
    },
    AbilityCastFinish {
        cast_id: u64,
        actor_id: MobId,
        ability_id: String,
    },
    AbilityCastInterrupt {
        cast_id: u64,
        actor_id: MobId,
        ability_id: String,
        reason: InterruptReason,
    },
    AbilityEffectApplied {
        cast_id: u64,
        actor_id: MobId,
        ability_id: String,
        target_id: MobId,
        outcome: EffectOutcome,
    },
    MobEnterCombat {
        mob_id: MobId,
    },
    MobExitCombat {
        mob_id: MobId,
        reason: ExitCombatReason,
    },
    MobMovement {
        mob_id: MobId,
        position: [f32; 3],
        attempted: bool,
        moved: bool,
    },
    MobDeath {
        mob_id: MobId,
        killer_id: Option<MobId>,
    },
    MobSpawn {
        mob_id: MobId,
        position: [f32; 3],
    },
}

impl GameEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::AbilityCastStart { .. }
            | Self::AbilityCastFinish { .. }
            | Self::AbilityCastInterrupt { .. }
            | Self::AbilityEffectApplied { .. }
            | Self::MobEnterCombat { .. }
            | Self::MobExitCombat { .. } => EventCategory::Combat,
            Self::MobMovement { .. } => EventCategory::Movement,
            Self::MobDeath { .. } | Self::MobSpawn { .. } => EventCategory::Lifecycle,
        }
    }
}

/// One appended record. Ids are assigned by the log, strictly increasing from 1.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EventLogEntry {
    pub event_id: u64,
    pub category: EventCategory,
    pub server_tick: u64,
    pub server_time_ms: u64,
    pub context_id: u32,
    pub source_location: Option<[f32; 3]>,
    pub event: GameEvent,
}
