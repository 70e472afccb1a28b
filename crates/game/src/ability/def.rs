use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stats::{DerivedStats, Resources, StatKind};
use crate::status::StatusEffectDef;
use crate::targeting::{AoeShape, DirectionMode, TargetType};

/// Ability tags gated by status flags.
pub const TAG_SPELL: &str = "spell";
pub const TAG_ATTACK: &str = "attack";
pub const TAG_MOVEMENT: &str = "movement";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityCost {
    #[serde(default)]
    pub mana: f32,
    #[serde(default)]
    pub stamina: f32,
    #[serde(default)]
    pub hp: f32,
}

impl AbilityCost {
    pub fn can_pay(&self, resources: &Resources) -> bool {
        resources.mana >= self.mana
            && resources.stamina >= self.stamina
            && resources.hp > self.hp
    }

    /// Pays against current values, saturating at zero.
    pub fn pay(&self, resources: &mut Resources) {
        resources.mana = (resources.mana - self.mana).max(0.0);
        resources.stamina = (resources.stamina - self.stamina).max(0.0);
        resources.hp = (resources.hp - self.hp).max(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityEffect {
    Damage {
        base: f32,
        #[serde(default)]
        scale_stat: Option<StatKind>,
        #[serde(default)]
        scale: f32,
    },
    Heal {
        base: f32,
        #[serde(default)]
        scale_stat: Option<StatKind>,
        #[serde(default)]
        scale: f32,
    },
    ApplyStatus {
        status: StatusEffectDef,
        /// 0 means the status definition's own duration is used unclamped.
        #[serde(default)]
        max_duration_ms: u64,
    },
}

impl AbilityEffect {
    pub fn scaled_amount(base: f32, scale_stat: Option<StatKind>, scale: f32, stats: &DerivedStats) -> f32 {
        let stat_value = match scale_stat {
            Some(StatKind::Strength) => stats.strength,
            Some(StatKind::Dexterity) => stats.dexterity,
            Some(StatKind::Intelligence) => stats.intelligence,
            Some(StatKind::Constitution) => stats.constitution,
            Some(StatKind::MaxHp) => stats.max_hp,
            Some(StatKind::MaxMana) => stats.max_mana,
            Some(StatKind::MaxStamina) => stats.max_stamina,
            Some(StatKind::MoveSpeed) => stats.move_speed_factor,
            None => 0.0,
        };
        base + stat_value * scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cast_time_ms: u64,
    #[serde(default)]
    pub cooldown_ms: u64,
    #[serde(default = "default_true")]
    pub on_gcd: bool,
    pub range: f32,
    #[serde(default)]
    pub cost: AbilityCost,
    pub target_type: TargetType,
    #[serde(default = "default_shape")]
    pub aoe_shape: AoeShape,
    #[serde(default = "default_direction")]
    pub direction_mode: DirectionMode,
    #[serde(default)]
    pub effects: Vec<AbilityEffect>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Use-check success chance in [0, 1].
    #[serde(default = "default_use_chance")]
    pub use_chance: f32,
    #[serde(default = "default_true")]
    pub requires_los: bool,
}

fn default_true() -> bool {
    true
}

fn default_shape() -> AoeShape {
    AoeShape::Single
}

fn default_direction() -> DirectionMode {
    DirectionMode::Target
}

fn default_use_chance() -> f32 {
    1.0
}

impl AbilityDef {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_instant(&self) -> bool {
        self.cast_time_ms == 0
    }
}

/// Data-driven ability registry, deserialized from the zone's ability book.
#[derive(Debug, Default)]
pub struct AbilityBook {
    abilities: HashMap<String, AbilityDef>,
}

impl AbilityBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: Vec<AbilityDef>) -> Self {
        let mut book = Self::new();
        for def in defs {
            book.insert(def);
        }
        book
    }

    pub fn insert(&mut self, def: AbilityDef) {
        self.abilities.insert(def.id.clone(), def);
    }

    pub fn get(&self, id: &str) -> Option<&AbilityDef> {
        self.abilities.get(id)
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_requires_surviving_hp() {
        let cost = AbilityCost {
            mana: 0.0,
            stamina: 0.0,
            hp: 50.0,
        };
        let mut resources = Resources {
            hp: 50.0,
            mana: 0.0,
            stamina: 0.0,
        };
        // paying the full hp pool would kill the actor
        assert!(!cost.can_pay(&resources));

        resources.hp = 60.0;
        assert!(cost.can_pay(&resources));
        cost.pay(&mut resources);
        assert_eq!(resources.hp, 10.0);
    }

    #[test]
    fn ability_book_deserializes() {
        let json = r#"[
            {
                "id": "shield_bash",
                "cast_time_ms": 0,
                "cooldown_ms": 2500,
                "range": 6.0,
                "target_type": "enemy",
                "cost": { "stamina": 10.0 },
                "tags": ["attack"],
                "effects": [
                    { "kind": "damage", "base": 15.0, "scale_stat": "Strength", "scale": 1.5 }
                ]
            }
        ]"#;
        let defs: Vec<AbilityDef> = serde_json::from_str(json).unwrap();
        let book = AbilityBook::from_defs(defs);

        let bash = book.get("shield_bash").unwrap();
        assert!(bash.on_gcd);
        assert!(bash.is_instant());
        assert_eq!(bash.aoe_shape, AoeShape::Single);
        assert!(bash.has_tag(TAG_ATTACK));
    }
}
