use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryStats {
    pub strength: f32,
    pub dexterity: f32,
    pub intelligence: f32,
    pub constitution: f32,
}

impl Default for PrimaryStats {
    fn default() -> Self {
        Self {
            strength: 10.0,
            dexterity: 10.0,
            intelligence: 10.0,
            constitution: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Strength,
    Dexterity,
    Intelligence,
    Constitution,
    MaxHp,
    MaxMana,
    MaxStamina,
    MoveSpeed,
}

impl StatKind {
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            Self::Strength | Self::Dexterity | Self::Intelligence | Self::Constitution
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModifierOp {
    Add,
    Mul,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: StatKind,
    pub op: ModifierOp,
    pub amount: f32,
}

/// Current resource pools. Maxima live on [`DerivedStats`]; these are the
/// authoritative current values and are clamped whenever maxima change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resources {
    pub hp: f32,
    pub mana: f32,
    pub stamina: f32,
}

impl Resources {
    pub fn full(derived: &DerivedStats) -> Self {
        Self {
            hp: derived.max_hp,
            mana: derived.max_mana,
            stamina: derived.max_stamina,
        }
    }

    pub fn clamp_to(&mut self, derived: &DerivedStats) {
        self.hp = self.hp.clamp(0.0, derived.max_hp);
        self.mana = self.mana.clamp(0.0, derived.max_mana);
        self.stamina = self.stamina.clamp(0.0, derived.max_stamina);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedStats {
    pub strength: f32,
    pub dexterity: f32,
    pub intelligence: f32,
    pub constitution: f32,
    pub max_hp: f32,
    pub max_mana: f32,
    pub max_stamina: f32,
    pub move_speed_factor: f32,
}

/// Folds base primaries and modifier sources into derived combat stats.
/// Cheap no-op while clean; any modifier-source change marks it dirty.
#[derive(Debug)]
pub struct StatsController {
    derived: DerivedStats,
    dirty: bool,
}

impl StatsController {
    pub fn new(base: &PrimaryStats) -> Self {
        Self {
            derived: fold(base, &[]),
            dirty: false,
        }
    }

    pub fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recomputes when dirty and clamps current resources to the new maxima.
    pub fn recompute(
        &mut self,
        base: &PrimaryStats,
        modifiers: &[StatModifier],
        resources: &mut Resources,
    ) {
        if !self.dirty {
            return;
        }
        self.derived = fold(base, modifiers);
        resources.clamp_to(&self.derived);
        self.dirty = false;
    }
}

fn fold(base: &PrimaryStats, modifiers: &[StatModifier]) -> DerivedStats {
    let strength = fold_stat(base.strength, StatKind::Strength, modifiers);
    let dexterity = fold_stat(base.dexterity, StatKind::Dexterity, modifiers);
    let intelligence = fold_stat(base.intelligence, StatKind::Intelligence, modifiers);
    let constitution = fold_stat(base.constitution, StatKind::Constitution, modifiers);

    let max_hp = fold_stat(100.0 + constitution * 25.0, StatKind::MaxHp, modifiers);
    let max_mana = fold_stat(50.0 + intelligence * 15.0, StatKind::MaxMana, modifiers);
    let max_stamina = fold_stat(50.0 + strength * 10.0, StatKind::MaxStamina, modifiers);

    let move_speed_factor = fold_raw(1.0, StatKind::MoveSpeed, modifiers).max(0.0);

    DerivedStats {
        strength,
        dexterity,
        intelligence,
        constitution,
        max_hp,
        max_mana,
        max_stamina,
        move_speed_factor,
    }
}

/// Add, then mul, then override; clamp to 1 and round.
fn fold_stat(base: f32, stat: StatKind, modifiers: &[StatModifier]) -> f32 {
    fold_raw(base, stat, modifiers).round().max(1.0)
}

fn fold_raw(base: f32, stat: StatKind, modifiers: &[StatModifier]) -> f32 {
    let mut value = base;
    for m in modifiers.iter().filter(|m| m.stat == stat) {
        if let ModifierOp::Add = m.op {
            value += m.amount;
        }
    }
    for m in modifiers.iter().filter(|m| m.stat == stat) {
        if let ModifierOp::Mul = m.op {
            value *= m.amount;
        }
    }
    for m in modifiers.iter().filter(|m| m.stat == stat) {
        if let ModifierOp::Override = m.op {
            value = m.amount;
        }
    }
    value
}
