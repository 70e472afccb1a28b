use glam::Vec3;

use crate::mob::MobId;
use crate::status::StatusEffectDef;

/// Fixed 32-bit FNV-1a over the request identity, so ability outcomes are
/// reproducible in tests and replays.
pub fn cast_seed(request_id: &str, actor_id: MobId, server_tick: u64) -> u32 {
    const OFFSET: u32 = 0x811c9dc5;
    const PRIME: u32 = 0x01000193;

    let mut hash = OFFSET;
    let mut eat = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= b as u32;
            hash = hash.wrapping_mul(PRIME);
        }
    };
    eat(request_id.as_bytes());
    eat(&actor_id.to_le_bytes());
    eat(&server_tick.to_le_bytes());
    hash
}

/// Small xorshift stream over the cast seed.
#[derive(Debug, Clone)]
pub struct CastRng {
    state: u32,
}

impl CastRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    pub fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f32() * (hi - lo)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    Damage { amount: f32 },
    Heal { amount: f32 },
    Status { def: StatusEffectDef, duration_ms: u64 },
    NoEffect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub target_id: MobId,
    pub effect_index: usize,
    pub kind: OutcomeKind,
}

/// Precomputed at acceptance, applied verbatim at resolution. Owned by the
/// active cast; nothing else holds a reference to it.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityResult {
    pub success: bool,
    pub target_position: Vec3,
    pub outcomes: Vec<TargetOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_stable_and_sensitive() {
        let a = cast_seed("req-1", 42, 100);
        let b = cast_seed("req-1", 42, 100);
        let c = cast_seed("req-2", 42, 100);
        let d = cast_seed("req-1", 43, 100);
        let e = cast_seed("req-1", 42, 101);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);
    }

    #[test]
    fn rng_stream_is_deterministic() {
        let mut r1 = CastRng::new(cast_seed("req", 1, 1));
        let mut r2 = CastRng::new(cast_seed("req", 1, 1));
        for _ in 0..16 {
            assert_eq!(r1.next_u32(), r2.next_u32());
        }

        let roll = r1.next_range(0.9, 1.1);
        assert!((0.9..1.1).contains(&roll));
    }
}
