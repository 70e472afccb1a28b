use std::collections::HashMap;

use crate::mob::MobId;

/// Per-NPC threat table. Raw values are server-internal; replication sees
/// percentages relative to the top entry, clamped so a nonzero entry is
/// never rounded down to invisible.
#[derive(Debug, Default)]
pub struct AggroTable {
    raw: HashMap<MobId, f32>,
}

impl AggroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: MobId, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        *self.raw.entry(source).or_insert(0.0) += amount;
    }

    pub fn remove(&mut self, source: MobId) {
        self.raw.remove(&source);
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn contains(&self, source: MobId) -> bool {
        self.raw.contains_key(&source)
    }

    pub fn raw_value(&self, source: MobId) -> f32 {
        self.raw.get(&source).copied().unwrap_or(0.0)
    }

    pub fn sources(&self) -> impl Iterator<Item = MobId> + '_ {
        self.raw.keys().copied()
    }

    /// Highest-threat source; ties break toward the lower id so iteration
    /// order never leaks into behavior.
    pub fn top(&self) -> Option<MobId> {
        self.raw
            .iter()
            .max_by(|(a_id, a), (b_id, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b_id.cmp(a_id))
            })
            .map(|(&id, _)| id)
    }

    /// Drop entries whose source id is no longer a live combatant.
    pub fn prune(&mut self, keep: impl Fn(MobId) -> bool) {
        self.raw.retain(|&id, _| keep(id));
    }

    /// Relative-percent projection for replicated state, sorted by id.
    pub fn synced(&self) -> Vec<(MobId, u8)> {
        let top = self
            .raw
            .values()
            .fold(0.0f32, |acc, &v| if v > acc { v } else { acc });
        if top <= 0.0 {
            return Vec::new();
        }

        let mut out: Vec<(MobId, u8)> = self
            .raw
            .iter()
            .map(|(&id, &v)| {
                let percent = (v / top * 100.0).round().clamp(1.0, 100.0) as u8;
                (id, percent)
            })
            .collect();
        out.sort_unstable_by_key(|&(id, _)| id);
        out
    }
}
