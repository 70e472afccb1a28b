mod decision;
mod intent;
mod sensing;
mod steering;
mod target_selection;

pub use intent::{AbilityIntent, AbilityIntentSystem};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::constants::MELEE_RANGE;
use crate::mob::{MobId, Mobs};
use crate::physics::NavMesh;

#[derive(Debug, Clone, Copy, Default)]
pub struct Awareness {
    pub in_combat: bool,
    pub top_aggro: Option<MobId>,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectedTarget {
    pub id: MobId,
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    #[default]
    Idle,
    Chase,
    Wander,
}

/// Per-NPC AI component state, advanced by the five pipeline systems.
#[derive(Debug, Default)]
pub struct NpcAi {
    pub awareness: Awareness,
    pub target: Option<SelectedTarget>,
    pub behavior: Behavior,
    pub desired_range: f32,
    pub next_decision_at_ms: u64,
    pub moving_until_ms: u64,
    pub wander_yaw: f32,
    /// Unit steering direction for this tick, zero when holding still.
    pub steering: Vec3,
    pub path: Vec<Vec3>,
    pub path_goal: Option<Vec3>,
    pub last_repath_at_ms: u64,
    /// Navmesh node the NPC currently stands on.
    pub node_ref: u64,
}

impl NpcAi {
    pub fn new() -> Self {
        Self {
            desired_range: MELEE_RANGE,
            ..Self::default()
        }
    }
}

/// Runs sensing, target selection, decision, and steering in order over all
/// NPCs. Ability intents are drained by the separate [`AbilityIntentSystem`].
pub struct AiController {
    rng: SmallRng,
}

impl AiController {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn fixed_tick(&mut self, now_ms: u64, mobs: &mut Mobs, navmesh: &dyn NavMesh) {
        let npc_ids: Vec<_> = mobs
            .npc_ids()
            .into_iter()
            .filter(|&id| mobs.get(id).is_some_and(|m| m.is_alive()))
            .collect();

        sensing::run(&npc_ids, mobs);
        target_selection::run(&npc_ids, mobs);
        decision::run(&npc_ids, mobs, now_ms, &mut self.rng);
        steering::run(&npc_ids, mobs, now_ms, navmesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::Mob;
    use crate::physics::FlatWorld;

    fn setup() -> (Mobs, FlatWorld, AiController) {
        let mut mobs = Mobs::new();
        mobs.insert(Mob::player(1, 1, Vec3::new(10.0, 0.0, 0.0)));
        mobs.insert(Mob::npc(10, 2, Vec3::ZERO));
        (mobs, FlatWorld::new(100.0), AiController::new(7))
    }

    #[test]
    fn aggro_drives_chase() {
        let (mut mobs, world, mut ai) = setup();
        {
            let npc = mobs.get_mut(10).unwrap();
            npc.in_combat = true;
            npc.as_npc_mut().unwrap().aggro.add(1, 50.0);
        }

        ai.fixed_tick(1000, &mut mobs, &world);

        let npc = mobs.get(10).unwrap().as_npc().unwrap();
        assert_eq!(npc.ai.behavior, Behavior::Chase);
        assert_eq!(npc.ai.target.unwrap().id, 1);
        // steering points toward the player on +x
        assert!(npc.ai.steering.x > 0.9);
    }

    #[test]
    fn in_melee_range_switches_to_idle_facing_target() {
        let (mut mobs, world, mut ai) = setup();
        mobs.get_mut(1).unwrap().position = Vec3::new(1.0, 0.0, 0.0);
        {
            let npc = mobs.get_mut(10).unwrap();
            npc.in_combat = true;
            npc.as_npc_mut().unwrap().aggro.add(1, 50.0);
        }

        ai.fixed_tick(1000, &mut mobs, &world);

        let mob = mobs.get(10).unwrap();
        let npc = mob.as_npc().unwrap();
        assert_eq!(npc.ai.behavior, Behavior::Idle);
        assert_eq!(npc.ai.steering, Vec3::ZERO);
        // facing +x
        assert!((mob.facing_yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn idle_npc_eventually_wanders() {
        let (mut mobs, world, mut ai) = setup();

        let mut wandered = false;
        for i in 0..100 {
            ai.fixed_tick(1000 + i * 50, &mut mobs, &world);
            let npc = mobs.get(10).unwrap().as_npc().unwrap();
            if npc.ai.behavior == Behavior::Wander && npc.ai.steering.length() > 0.5 {
                wandered = true;
                break;
            }
        }
        assert!(wandered);
    }

    #[test]
    fn dead_target_clears_selection() {
        let (mut mobs, world, mut ai) = setup();
        {
            let npc = mobs.get_mut(10).unwrap();
            npc.in_combat = true;
            npc.as_npc_mut().unwrap().aggro.add(1, 50.0);
        }
        ai.fixed_tick(1000, &mut mobs, &world);
        assert!(mobs.get(10).unwrap().as_npc().unwrap().ai.target.is_some());

        mobs.get_mut(1).unwrap().resources.hp = 0.0;
        ai.fixed_tick(1050, &mut mobs, &world);
        assert!(mobs.get(10).unwrap().as_npc().unwrap().ai.target.is_none());
    }
}
