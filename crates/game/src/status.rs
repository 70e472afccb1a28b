use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::mob::MobId;
use crate::stats::{DerivedStats, StatModifier};

bitflags! {
    /// State gates projected from active statuses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StateFlags: u8 {
        const STUNNED = 1 << 0;
        const SILENCED = 1 << 1;
        const DISARMED = 1 << 2;
        const ROOTED = 1 << 3;
        const IMMOBILIZED = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateGate {
    Stunned,
    Silenced,
    Disarmed,
    Rooted,
    Immobilized,
}

impl StateGate {
    fn flag(self) -> StateFlags {
        match self {
            Self::Stunned => StateFlags::STUNNED,
            Self::Silenced => StateFlags::SILENCED,
            Self::Disarmed => StateFlags::DISARMED,
            Self::Rooted => StateFlags::ROOTED,
            Self::Immobilized => StateFlags::IMMOBILIZED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Buff,
    Debuff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingMode {
    Replace,
    Refresh,
    Stack,
    Independent,
}

/// Periodic hp delta carried by a status. Negative amounts damage the
/// holder, positive amounts heal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicEffect {
    pub interval_ms: u64,
    pub hp_per_tick: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDef {
    pub id: String,
    pub category: StatusCategory,
    pub stacking: StackingMode,
    /// 0 means the status never expires on its own.
    pub duration_ms: u64,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
    #[serde(default)]
    pub gates: Vec<StateGate>,
    #[serde(default)]
    pub blocked_ability_tags: Vec<String>,
    #[serde(default)]
    pub immunity_tags: Vec<String>,
    #[serde(default)]
    pub periodic: Option<PeriodicEffect>,
}

fn default_max_stacks() -> u32 {
    1
}

/// Derived stats of both parties captured at apply time. Periodic pulses and
/// late projections read this snapshot, not live stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub source_stats: DerivedStats,
    pub target_stats: DerivedStats,
}

#[derive(Debug, Clone)]
pub struct ActiveStatus {
    pub def: StatusEffectDef,
    pub source_id: MobId,
    pub applied_at_ms: u64,
    pub expires_at_ms: u64,
    pub stacks: u32,
    pub next_tick_at_ms: Option<u64>,
    pub snapshot: StatusSnapshot,
}

/// One due periodic pulse, to be applied by the zone with the usual clamps.
#[derive(Debug, Clone)]
pub struct StatusPulse {
    pub status_id: String,
    pub source_id: MobId,
    pub hp_delta: f32,
}

#[derive(Debug, Default)]
pub struct StatusTickOutcome {
    pub expired: Vec<String>,
    pub pulses: Vec<StatusPulse>,
}

/// Per-mob active-status list with stacking modes, expiry, and cached
/// projections. Caches are rebuilt on every mutation; `take_changed` lets the
/// owner trigger a stats recompute exactly once per mutation batch.
#[derive(Debug, Default)]
pub struct StatusController {
    active: Vec<ActiveStatus>,
    cached_modifiers: Vec<StatModifier>,
    cached_flags: StateFlags,
    cached_blocked_tags: Vec<String>,
    cached_immunities: Vec<String>,
    changed: bool,
}

impl StatusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        def: &StatusEffectDef,
        source_id: MobId,
        snapshot: StatusSnapshot,
        now_ms: u64,
        duration_ms: u64,
    ) {
        let expires_at_ms = if duration_ms == 0 {
            0
        } else {
            now_ms + duration_ms
        };

        match def.stacking {
            StackingMode::Replace => {
                self.active.retain(|s| s.def.id != def.id);
                self.insert(def, source_id, snapshot, now_ms, expires_at_ms);
            }
            StackingMode::Refresh => {
                if let Some(existing) = self.active.iter_mut().find(|s| s.def.id == def.id) {
                    existing.expires_at_ms = expires_at_ms;
                } else {
                    self.insert(def, source_id, snapshot, now_ms, expires_at_ms);
                }
            }
            StackingMode::Stack => {
                if let Some(existing) = self.active.iter_mut().find(|s| s.def.id == def.id) {
                    existing.stacks = (existing.stacks + 1).min(def.max_stacks.max(1));
                    existing.expires_at_ms = expires_at_ms;
                } else {
                    self.insert(def, source_id, snapshot, now_ms, expires_at_ms);
                }
            }
            StackingMode::Independent => {
                self.insert(def, source_id, snapshot, now_ms, expires_at_ms);
            }
        }

        self.rebuild_caches();
    }

    fn insert(
        &mut self,
        def: &StatusEffectDef,
        source_id: MobId,
        snapshot: StatusSnapshot,
        now_ms: u64,
        expires_at_ms: u64,
    ) {
        self.active.push(ActiveStatus {
            def: def.clone(),
            source_id,
            applied_at_ms: now_ms,
            expires_at_ms,
            stacks: 1,
            next_tick_at_ms: def.periodic.map(|p| now_ms + p.interval_ms),
            snapshot,
        });
    }

    pub fn remove(&mut self, status_id: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|s| s.def.id != status_id);
        let removed = self.active.len() != before;
        if removed {
            self.rebuild_caches();
        }
        removed
    }

    pub fn clear_all(&mut self) {
        if !self.active.is_empty() {
            self.active.clear();
            self.rebuild_caches();
        }
    }

    /// Removes expired entries and collects due periodic pulses.
    pub fn fixed_tick(&mut self, now_ms: u64) -> StatusTickOutcome {
        let mut outcome = StatusTickOutcome::default();

        for status in &mut self.active {
            let Some(periodic) = status.def.periodic else {
                continue;
            };
            while let Some(next) = status.next_tick_at_ms {
                if now_ms < next {
                    break;
                }
                if status.expires_at_ms > 0 && next > status.expires_at_ms {
                    status.next_tick_at_ms = None;
                    break;
                }
                outcome.pulses.push(StatusPulse {
                    status_id: status.def.id.clone(),
                    source_id: status.source_id,
                    hp_delta: periodic.hp_per_tick * status.stacks as f32,
                });
                status.next_tick_at_ms = Some(next + periodic.interval_ms);
            }
        }

        let mut expired_any = false;
        self.active.retain(|s| {
            let expired = s.expires_at_ms > 0 && now_ms >= s.expires_at_ms;
            if expired {
                outcome.expired.push(s.def.id.clone());
                expired_any = true;
            }
            !expired
        });

        if expired_any {
            self.rebuild_caches();
        }

        outcome
    }

    pub fn flags(&self) -> StateFlags {
        self.cached_flags
    }

    pub fn stat_modifiers(&self) -> &[StatModifier] {
        &self.cached_modifiers
    }

    pub fn blocks_any_tag(&self, tags: &[String]) -> bool {
        tags.iter()
            .any(|t| self.cached_blocked_tags.iter().any(|b| b == t))
    }

    pub fn is_immune_to_any(&self, tags: &[String]) -> bool {
        tags.iter()
            .any(|t| self.cached_immunities.iter().any(|i| i == t))
    }

    pub fn has(&self, status_id: &str) -> bool {
        self.active.iter().any(|s| s.def.id == status_id)
    }

    pub fn stacks(&self, status_id: &str) -> u32 {
        self.active
            .iter()
            .filter(|s| s.def.id == status_id)
            .map(|s| s.stacks)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveStatus> {
        self.active.iter()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// True once after any mutation since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn rebuild_caches(&mut self) {
        self.cached_modifiers.clear();
        self.cached_flags = StateFlags::empty();
        self.cached_blocked_tags.clear();
        self.cached_immunities.clear();

        for status in &self.active {
            for m in &status.def.modifiers {
                let mut m = *m;
                if let crate::stats::ModifierOp::Add = m.op {
                    m.amount *= status.stacks as f32;
                }
                self.cached_modifiers.push(m);
            }
            for gate in &status.def.gates {
                self.cached_flags |= gate.flag();
            }
            for tag in &status.def.blocked_ability_tags {
                if !self.cached_blocked_tags.contains(tag) {
                    self.cached_blocked_tags.push(tag.clone());
                }
            }
            for tag in &status.def.immunity_tags {
                if !self.cached_immunities.contains(tag) {
                    self.cached_immunities.push(tag.clone());
                }
            }
        }

        self.changed = true;
    }
}
