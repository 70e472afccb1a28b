mod queue;

pub use queue::{InputCounters, PlayerPending, QueuedMoveInput, SnapTarget};

use glam::Vec3;

use crate::constants::{
    MAX_INPUT_CATCH_UP_TICKS, MAX_INPUT_LAG_TICKS, PLAYER_SPRINT_MULTIPLIER, SERVER_SNAP_DISTANCE,
    TICK_MS,
};
use crate::event::{EventLog, GameEvent};
use crate::mob::{MobId, Mobs};
use crate::physics::{CapsuleStepInput, CollisionWorld, NavMesh};
use crate::status::StateFlags;
use crate::targeting::yaw_from_direction;

/// NPC steering integration followed by per-player input draining with the
/// snap-lock protocol.
#[derive(Debug, Default)]
pub struct MovementController;

impl MovementController {
    pub fn new() -> Self {
        Self
    }

    pub fn fixed_tick(
        &mut self,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        navmesh: &dyn NavMesh,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) {
        for npc_id in mobs.npc_ids() {
            self.integrate_npc(npc_id, now_ms, mobs, navmesh);
        }
        for player_id in mobs.player_ids() {
            self.drain_player(player_id, now_ms, server_tick, mobs, collision, log);
        }
    }

    fn integrate_npc(&self, npc_id: MobId, now_ms: u64, mobs: &mut Mobs, navmesh: &dyn NavMesh) {
        let Some(mob) = mobs.get_mut(npc_id) else {
            return;
        };
        if !mob.is_alive() {
            return;
        }
        let flags = mob.statuses.flags();
        if flags.intersects(StateFlags::STUNNED | StateFlags::ROOTED | StateFlags::IMMOBILIZED) {
            return;
        }

        let steering = match mob.as_npc() {
            Some(npc) => npc.ai.steering,
            None => return,
        };
        if steering.length_squared() < 1e-6 {
            return;
        }

        let dt = TICK_MS as f32 / 1000.0;
        let desired = mob.position + steering * mob.effective_move_speed() * dt;
        let result = navmesh.validate_movement(mob.position, desired);

        mob.position = result.position;
        if let Some(npc) = mob.as_npc_mut() {
            npc.ai.node_ref = result.node_ref;
            if result.collided && result.movement_ratio < 0.01 {
                // wedged against something; cut the wander short
                npc.ai.moving_until_ms = now_ms;
            }
        }
    }

    fn drain_player(
        &self,
        player_id: MobId,
        now_ms: u64,
        server_tick: u64,
        mobs: &mut Mobs,
        collision: &dyn CollisionWorld,
        log: &mut EventLog,
    ) {
        let Some(mob) = mobs.get_mut(player_id) else {
            return;
        };

        {
            let Some(player) = mob.as_player_mut() else {
                return;
            };
            let pending = &mut player.pending;
            pending.input_budget_ticks =
                (pending.input_budget_ticks + 1).min(MAX_INPUT_CATCH_UP_TICKS);

            if pending.snap_locked || pending.queue_is_empty() {
                pending.counters.idle_ticks += 1;
                return;
            }

            if pending.client_tick_offset.is_none() {
                let first_tick = pending.front().map(|i| i.tick);
                if let Some(tick) = first_tick {
                    pending.client_tick_offset = Some(server_tick as i64 - tick as i64);
                }
            }
        }

        let movement_blocked = mob.statuses.flags().intersects(
            StateFlags::STUNNED | StateFlags::ROOTED | StateFlags::IMMOBILIZED,
        );
        let base_speed = mob.effective_move_speed();

        let mut position = mob.position;
        let mut velocity_y = mob.velocity_y;
        let mut grounded = mob.grounded;
        let mut facing_yaw = mob.facing_yaw;

        let Some(player) = mob.as_player_mut() else {
            return;
        };
        let pending = &mut player.pending;
        let offset = pending.client_tick_offset.unwrap_or(0);
        let mut inputs = pending.take_inputs();

        let mut attempted = false;
        let mut moved = false;
        let mut snap: Option<SnapTarget> = None;

        while let Some(input) = inputs.front().copied() {
            let mapped_tick = input.tick as i64 + offset;

            if mapped_tick < server_tick as i64 - MAX_INPUT_LAG_TICKS as i64 {
                inputs.pop_front();
                pending.counters.dropped_stale += 1;
                continue;
            }
            if mapped_tick > server_tick as i64 || pending.input_budget_ticks == 0 {
                break;
            }
            inputs.pop_front();

            if input.seq <= pending.last_processed_seq {
                continue;
            }

            let mut direction = Vec3::new(
                input.direction_x.clamp(-1.0, 1.0),
                0.0,
                input.direction_z.clamp(-1.0, 1.0),
            );
            let mut jump = input.jump_pressed;
            if movement_blocked {
                direction = Vec3::ZERO;
                jump = false;
            }
            let speed = if input.is_sprinting {
                base_speed * PLAYER_SPRINT_MULTIPLIER
            } else {
                base_speed
            };

            let out = collision.step_capsule(&CapsuleStepInput {
                position,
                direction,
                speed,
                delta_time_ms: TICK_MS,
                jump_pressed: jump,
                velocity_y,
                grounded,
            });

            attempted |= direction.length_squared() > 1e-6 || jump;
            moved |= (out.position - position).length_squared() > 1e-8;
            if direction.length_squared() > 1e-6 {
                facing_yaw = yaw_from_direction(direction);
            }

            position = out.position;
            velocity_y = out.velocity_y;
            grounded = out.grounded;
            pending.last_processed_seq = input.seq;
            pending.input_budget_ticks -= 1;
            pending.counters.processed += 1;

            let drift_sq = (input.predicted - position).length_squared();
            if drift_sq > SERVER_SNAP_DISTANCE * SERVER_SNAP_DISTANCE {
                pending.counters.dropped_on_snap += inputs.len() as u64;
                inputs.clear();
                snap = Some(SnapTarget {
                    position,
                    seq: input.seq,
                });
                break;
            }
        }

        if let Some(target) = snap {
            pending.lock_for_snap(target);
        } else {
            pending.restore_inputs(inputs);
        }

        mob.position = position;
        mob.velocity_y = velocity_y;
        mob.grounded = grounded;
        mob.facing_yaw = facing_yaw;

        if attempted || moved {
            log.append(
                server_tick,
                now_ms,
                Some(position.to_array()),
                GameEvent::MobMovement {
                    mob_id: player_id,
                    position: position.to_array(),
                    attempted,
                    moved,
                },
            );
        }
    }
}
