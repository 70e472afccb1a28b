use glam::Vec3;

use crate::mob::{MobId, Mobs};
use crate::physics::NavMesh;
use crate::targeting::{forward_from_yaw, yaw_from_direction};

use super::Behavior;

const WAYPOINT_REACHED: f32 = 0.15;
const REPATH_TARGET_MOVED: f32 = 0.5;
const REPATH_COOLDOWN_MS: u64 = 100;

/// Produces this tick's unit steering direction. Chase follows the smooth
/// path toward the selected target, wander follows the decision yaw, idle
/// holds still but keeps facing the target.
pub(super) fn run(npc_ids: &[MobId], mobs: &mut Mobs, now_ms: u64, navmesh: &dyn NavMesh) {
    for &npc_id in npc_ids {
        let Some(mob) = mobs.get_mut(npc_id) else {
            continue;
        };
        let position = mob.position;
        let mut facing = None;

        if let Some(npc) = mob.as_npc_mut() {
            npc.ai.steering = match npc.ai.behavior {
                Behavior::Chase => {
                    let Some(target) = npc.ai.target else {
                        continue;
                    };

                    let target_moved = npc
                        .ai
                        .path_goal
                        .is_none_or(|goal| (goal - target.position).length() > REPATH_TARGET_MOVED);
                    let cooldown_over =
                        now_ms.saturating_sub(npc.ai.last_repath_at_ms) >= REPATH_COOLDOWN_MS;

                    if npc.ai.path.is_empty() || (target_moved && cooldown_over) {
                        npc.ai.path = navmesh
                            .find_path(position, target.position)
                            .unwrap_or_default();
                        npc.ai.path_goal = Some(target.position);
                        npc.ai.last_repath_at_ms = now_ms;
                    }

                    while npc
                        .ai
                        .path
                        .first()
                        .is_some_and(|w| horizontal(*w - position).length() < WAYPOINT_REACHED)
                    {
                        npc.ai.path.remove(0);
                    }

                    let dir = match npc.ai.path.first() {
                        Some(&waypoint) => horizontal(waypoint - position).normalize_or_zero(),
                        None => horizontal(target.position - position).normalize_or_zero(),
                    };
                    if dir.length_squared() > 0.0 {
                        facing = Some(yaw_from_direction(dir));
                    }
                    dir
                }
                Behavior::Wander => {
                    facing = Some(npc.ai.wander_yaw);
                    forward_from_yaw(npc.ai.wander_yaw)
                }
                Behavior::Idle => {
                    if let Some(target) = npc.ai.target {
                        let to_target = horizontal(target.position - position);
                        if to_target.length_squared() > 1e-6 {
                            facing = Some(yaw_from_direction(to_target));
                        }
                    }
                    Vec3::ZERO
                }
            };
        }

        if let Some(yaw) = facing {
            mob.facing_yaw = yaw;
        }
    }
}

fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}
