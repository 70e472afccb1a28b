use std::collections::HashMap;

use glam::Vec3;

use crate::constants::{
    LOS_CELL_SIZE, LOS_MAX_RANGE, LOS_MAX_STALE_TICKS, LOS_MOVE_THRESHOLD, LOS_UPDATE_STRIDE,
};
use crate::mob::{MobId, Mobs};
use crate::physics::CollisionWorld;

const EYE_HEIGHT: f32 = 1.5;

#[derive(Debug, Clone, Copy)]
struct PlayerLosState {
    last_update_tick: u64,
    last_update_position: Vec3,
}

/// Spatial-hash-backed periodic refresh of per-player visible target sets.
/// Players are refreshed round-robin every LOS_UPDATE_STRIDE ticks, sooner
/// when they move past the threshold, and at latest after
/// LOS_MAX_STALE_TICKS.
#[derive(Debug, Default)]
pub struct LineOfSightTracker {
    states: HashMap<MobId, PlayerLosState>,
}

impl LineOfSightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, server_tick: u64, mobs: &mut Mobs, collision: &dyn CollisionWorld) {
        self.states.retain(|id, _| mobs.contains(*id));

        let mut grid: HashMap<(i32, i32), Vec<MobId>> = HashMap::new();
        for mob in mobs.iter().filter(|m| m.is_alive()) {
            grid.entry(cell_of(mob.position)).or_default().push(mob.id);
        }

        let cell_radius = (LOS_MAX_RANGE / LOS_CELL_SIZE).ceil() as i32;

        for (index, player_id) in mobs.player_ids().into_iter().enumerate() {
            let Some(player) = mobs.get(player_id) else {
                continue;
            };
            let position = player.position;

            let due = match self.states.get(&player_id) {
                Some(state) => {
                    let stride_due =
                        (server_tick + index as u64) % LOS_UPDATE_STRIDE == 0;
                    let moved = (position - state.last_update_position).length()
                        >= LOS_MOVE_THRESHOLD;
                    let stale =
                        server_tick.saturating_sub(state.last_update_tick) >= LOS_MAX_STALE_TICKS;
                    stride_due || moved || stale
                }
                None => true,
            };
            if !due {
                continue;
            }

            let visible = self.scan(player_id, position, &grid, cell_radius, mobs, collision);

            self.states.insert(
                player_id,
                PlayerLosState {
                    last_update_tick: server_tick,
                    last_update_position: position,
                },
            );

            let Some(player) = mobs.get_mut(player_id).and_then(|m| m.as_player_mut()) else {
                continue;
            };
            if !sets_equal(&player.visible_targets, &visible) {
                player.visible_targets = visible;
            }
        }
    }

    fn scan(
        &self,
        player_id: MobId,
        position: Vec3,
        grid: &HashMap<(i32, i32), Vec<MobId>>,
        cell_radius: i32,
        mobs: &Mobs,
        collision: &dyn CollisionWorld,
    ) -> Vec<MobId> {
        let center = cell_of(position);
        let eye = position + Vec3::Y * EYE_HEIGHT;
        let mut visible = Vec::new();

        for dx in -cell_radius..=cell_radius {
            for dz in -cell_radius..=cell_radius {
                let Some(ids) = grid.get(&(center.0 + dx, center.1 + dz)) else {
                    continue;
                };
                for &candidate_id in ids {
                    if candidate_id == player_id {
                        continue;
                    }
                    let Some(candidate) = mobs.get(candidate_id) else {
                        continue;
                    };
                    let offset = candidate.position - position;
                    if offset.length_squared() > LOS_MAX_RANGE * LOS_MAX_RANGE {
                        continue;
                    }
                    if collision.line_of_sight(eye, candidate.position + Vec3::Y * EYE_HEIGHT) {
                        visible.push(candidate_id);
                    }
                }
            }
        }

        visible.sort_unstable();
        visible
    }
}

fn cell_of(position: Vec3) -> (i32, i32) {
    (
        (position.x / LOS_CELL_SIZE).floor() as i32,
        (position.z / LOS_CELL_SIZE).floor() as i32,
    )
}

fn sets_equal(a: &[MobId], b: &[MobId]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::Mob;
    use crate::physics::FlatWorld;

    #[test]
    fn nearby_mobs_become_visible_sorted() {
        let world = FlatWorld::new(200.0);
        let mut mobs = Mobs::new();
        mobs.insert(Mob::player(1, 1, Vec3::ZERO));
        mobs.insert(Mob::npc(9, 2, Vec3::new(5.0, 0.0, 0.0)));
        mobs.insert(Mob::npc(3, 2, Vec3::new(0.0, 0.0, 5.0)));
        mobs.insert(Mob::npc(7, 2, Vec3::new(500.0, 0.0, 0.0)));

        let mut tracker = LineOfSightTracker::new();
        tracker.update(0, &mut mobs, &world);

        let player = mobs.get(1).unwrap().as_player().unwrap();
        assert_eq!(player.visible_targets, vec![3, 9]);
    }

    #[test]
    fn wall_hides_target_until_it_moves_out() {
        let world =
            FlatWorld::new(200.0).with_block(Vec3::new(0.0, 1.5, 2.5), Vec3::new(4.0, 3.0, 0.5));
        let mut mobs = Mobs::new();
        mobs.insert(Mob::player(1, 1, Vec3::ZERO));
        mobs.insert(Mob::player(2, 1, Vec3::new(0.0, 0.0, 5.0)));

        let mut tracker = LineOfSightTracker::new();
        tracker.update(0, &mut mobs, &world);
        assert!(mobs.get(1).unwrap().as_player().unwrap().visible_targets.is_empty());

        // B steps out from behind the wall
        mobs.get_mut(2).unwrap().position = Vec3::new(12.0, 0.0, 5.0);
        tracker.update(LOS_UPDATE_STRIDE, &mut mobs, &world);
        assert_eq!(
            mobs.get(1).unwrap().as_player().unwrap().visible_targets,
            vec![2]
        );

        // and back behind it
        mobs.get_mut(2).unwrap().position = Vec3::new(0.0, 0.0, 5.0);
        tracker.update(LOS_UPDATE_STRIDE * 2, &mut mobs, &world);
        assert!(mobs.get(1).unwrap().as_player().unwrap().visible_targets.is_empty());
    }

    #[test]
    fn updates_are_staggered_but_movement_forces_refresh() {
        let world = FlatWorld::new(200.0);
        let mut mobs = Mobs::new();
        mobs.insert(Mob::player(1, 1, Vec3::ZERO));
        mobs.insert(Mob::npc(5, 2, Vec3::new(3.0, 0.0, 0.0)));

        let mut tracker = LineOfSightTracker::new();
        // first sight is immediate (no prior state)
        tracker.update(1, &mut mobs, &world);
        assert_eq!(mobs.get(1).unwrap().as_player().unwrap().visible_targets, vec![5]);

        // npc walks away; off-stride tick without player movement: stale copy
        mobs.get_mut(5).unwrap().position = Vec3::new(500.0, 0.0, 0.0);
        tracker.update(2, &mut mobs, &world);
        assert_eq!(mobs.get(1).unwrap().as_player().unwrap().visible_targets, vec![5]);

        // player moves past the threshold: refresh happens off-stride too
        mobs.get_mut(1).unwrap().position = Vec3::new(2.0, 0.0, 0.0);
        tracker.update(3, &mut mobs, &world);
        assert!(mobs.get(1).unwrap().as_player().unwrap().visible_targets.is_empty());
    }

    #[test]
    fn dead_mobs_are_not_visible() {
        let world = FlatWorld::new(200.0);
        let mut mobs = Mobs::new();
        mobs.insert(Mob::player(1, 1, Vec3::ZERO));
        mobs.insert(Mob::npc(5, 2, Vec3::new(3.0, 0.0, 0.0)));
        mobs.get_mut(5).unwrap().resources.hp = 0.0;

        let mut tracker = LineOfSightTracker::new();
        tracker.update(0, &mut mobs, &world);
        assert!(mobs.get(1).unwrap().as_player().unwrap().visible_targets.is_empty());
    }
}
