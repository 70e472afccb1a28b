use rand::Rng;
use rand::rngs::SmallRng;

use crate::constants::MELEE_RANGE;
use crate::mob::{MobId, Mobs};
use crate::targeting::TargetSpec;

use super::{AbilityIntent, Behavior};

const WANDER_MOVE_MS: std::ops::Range<u64> = 800..2500;
const WANDER_PAUSE_MS: std::ops::Range<u64> = 2000..6000;

/// Chase the selected target until melee range, otherwise wander on a
/// randomized schedule.
pub(super) fn run(npc_ids: &[MobId], mobs: &mut Mobs, now_ms: u64, rng: &mut SmallRng) {
    for &npc_id in npc_ids {
        let Some(mob) = mobs.get_mut(npc_id) else {
            continue;
        };
        let position = mob.position;
        let primary_ability = mob
            .as_npc()
            .and_then(|n| n.primary_ability.clone());
        let Some(npc) = mob.as_npc_mut() else {
            continue;
        };

        if let Some(target) = npc.ai.target {
            npc.ai.behavior = Behavior::Chase;
            npc.ai.desired_range = MELEE_RANGE;

            let dist_sq = (target.position - position).length_squared();
            if dist_sq <= MELEE_RANGE * MELEE_RANGE {
                npc.ai.behavior = Behavior::Idle;
                npc.ai.moving_until_ms = now_ms;

                if npc.ability_intent.is_none() {
                    if let Some(ability_id) = primary_ability {
                        npc.ability_intent = Some(AbilityIntent {
                            ability_id,
                            target: TargetSpec {
                                target_entity_id: Some(target.id),
                                ..Default::default()
                            },
                        });
                    }
                }
            }
            continue;
        }

        if now_ms >= npc.ai.next_decision_at_ms {
            npc.ai.wander_yaw = rng.random_range(0.0..std::f32::consts::TAU);
            npc.ai.moving_until_ms = now_ms + rng.random_range(WANDER_MOVE_MS);
            npc.ai.next_decision_at_ms = now_ms + rng.random_range(WANDER_PAUSE_MS);
        }

        npc.ai.behavior = if now_ms <= npc.ai.moving_until_ms {
            Behavior::Wander
        } else {
            Behavior::Idle
        };
    }
}
