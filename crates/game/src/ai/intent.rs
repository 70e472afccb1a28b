use crate::ability::{AbilityEngine, AbilityUseRequest};
use crate::event::EventLog;
use crate::mob::Mobs;
use crate::physics::CollisionWorld;
use crate::targeting::TargetSpec;

/// A queued NPC ability decision, converted into a synthetic use request on
/// the next intent pass.
#[derive(Debug, Clone)]
pub struct AbilityIntent {
    pub ability_id: String,
    pub target: TargetSpec,
}

/// Bridges NPC ability intents into the ability engine. Runs after the AI
/// pipeline so intents queued this tick fire this tick; acks the engine
/// produces for NPC actors are dropped at the zone boundary.
#[derive(Debug, Default)]
pub struct AbilityIntentSystem {
    next_sequence: u64,
}

impl AbilityIntentSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed_tick(
        &mut self,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        engine: &mut AbilityEngine,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) {
        for npc_id in mobs.npc_ids() {
            let Some(intent) = mobs
                .get_mut(npc_id)
                .and_then(|m| m.as_npc_mut())
                .and_then(|n| n.ability_intent.take())
            else {
                continue;
            };

            self.next_sequence += 1;
            let request = AbilityUseRequest {
                request_id: format!("npc-{npc_id}-{}", self.next_sequence),
                sequence: self.next_sequence,
                client_tick: server_tick,
                actor_id: npc_id,
                ability_id: intent.ability_id,
                target: intent.target,
                client_time_ms: now_ms,
            };
            engine.handle_request(request, now_ms, server_tick, mobs, collision, log);
        }
    }
}
