mod flat;
mod rapier;

pub use flat::FlatWorld;
pub use rapier::RapierWorld;

use glam::Vec3;

/// Input to one capsule movement step. `direction` is the horizontal intent,
/// already clamped to the unit square by the caller.
#[derive(Debug, Clone, Copy)]
pub struct CapsuleStepInput {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub delta_time_ms: u64,
    pub jump_pressed: bool,
    pub velocity_y: f32,
    pub grounded: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CapsuleStepOutput {
    pub position: Vec3,
    pub velocity_y: f32,
    pub grounded: bool,
    /// Achieved horizontal displacement over intended, in [0, 1].
    pub movement_ratio: f32,
    pub collided: bool,
}

/// Collision-world port: capsule step simulation and line-of-sight rays.
/// Shared read-only across ticks; queries run on the zone task only.
pub trait CollisionWorld: Send + Sync {
    fn step_capsule(&self, input: &CapsuleStepInput) -> CapsuleStepOutput;

    /// True when the segment between the two points is unobstructed.
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct NavMoveResult {
    pub position: Vec3,
    pub node_ref: u64,
    pub collided: bool,
    pub movement_ratio: f32,
}

/// Navmesh port used by NPC steering and movement integration.
pub trait NavMesh: Send + Sync {
    fn is_on_mesh(&self, point: Vec3) -> bool;

    fn nearest_point(&self, point: Vec3, radius: f32) -> Option<Vec3>;

    fn sample_height(&self, point: Vec3) -> Option<f32>;

    /// Smooth path between two points, start exclusive, end inclusive.
    fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>>;

    /// Moves along the surface from `from` toward `to`, returning the final
    /// position plus a collided/ratio indicator.
    fn validate_movement(&self, from: Vec3, to: Vec3) -> NavMoveResult;
}
