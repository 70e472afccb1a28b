use glam::Vec3;

use super::{
    CapsuleStepInput, CapsuleStepOutput, CollisionWorld, NavMesh, NavMoveResult,
};

const GRAVITY: f32 = 20.0;
const JUMP_VELOCITY: f32 = 8.0;

/// Axis-aligned blocker used by the flat test world. Blocks both movement
/// and line of sight.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Block {
    fn contains_xz(&self, p: Vec3) -> bool {
        (p.x - self.center.x).abs() <= self.half_extents.x
            && (p.z - self.center.z).abs() <= self.half_extents.z
    }

    /// Slab-method segment test in 3D.
    fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let dir = to - from;
        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;

        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..3 {
            let (origin, delta, lo, hi) = match axis {
                0 => (from.x, dir.x, min.x, max.x),
                1 => (from.y, dir.y, min.y, max.y),
                _ => (from.z, dir.z, min.z, max.z),
            };
            if delta.abs() < 1e-6 {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / delta;
            let (t0, t1) = {
                let a = (lo - origin) * inv;
                let b = (hi - origin) * inv;
                if a < b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Flat-ground world: a square walkable plane at `floor_y` with box
/// obstacles. Implements both the collision-world and navmesh ports; tests
/// and demo zones run against it.
#[derive(Debug)]
pub struct FlatWorld {
    pub floor_y: f32,
    pub half_size: f32,
    blocks: Vec<Block>,
}

impl FlatWorld {
    pub fn new(half_size: f32) -> Self {
        Self {
            floor_y: 0.0,
            half_size,
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, center: Vec3, half_extents: Vec3) -> Self {
        self.blocks.push(Block {
            center,
            half_extents,
        });
        self
    }

    fn blocked_at(&self, p: Vec3) -> Option<&Block> {
        self.blocks.iter().find(|b| b.contains_xz(p))
    }

    fn in_bounds(&self, p: Vec3) -> bool {
        p.x.abs() <= self.half_size && p.z.abs() <= self.half_size
    }

    fn clamp_to_bounds(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(-self.half_size, self.half_size),
            p.y,
            p.z.clamp(-self.half_size, self.half_size),
        )
    }

    /// Walks horizontally from `from` toward `desired`, stopping at bounds
    /// and blockers. Returns (position, collided).
    fn walk(&self, from: Vec3, desired: Vec3) -> (Vec3, bool) {
        let clamped = self.clamp_to_bounds(desired);
        let mut collided = clamped != desired;

        if self.blocked_at(clamped).is_some() {
            collided = true;
            (from, collided)
        } else {
            (clamped, collided)
        }
    }
}

impl CollisionWorld for FlatWorld {
    fn step_capsule(&self, input: &CapsuleStepInput) -> CapsuleStepOutput {
        let dt = input.delta_time_ms as f32 / 1000.0;

        let dir = Vec3::new(
            input.direction.x.clamp(-1.0, 1.0),
            0.0,
            input.direction.z.clamp(-1.0, 1.0),
        );
        let dir = if dir.length_squared() > 1.0 {
            dir.normalize()
        } else {
            dir
        };

        let intended = dir * input.speed * dt;
        let desired = input.position + intended;
        let (mut position, collided) = self.walk(input.position, desired);

        let mut velocity_y = input.velocity_y;
        if input.grounded && input.jump_pressed {
            velocity_y = JUMP_VELOCITY;
        }
        velocity_y -= GRAVITY * dt;

        position.y += velocity_y * dt;
        let mut grounded = false;
        if position.y <= self.floor_y {
            position.y = self.floor_y;
            velocity_y = 0.0;
            grounded = true;
        }

        let intended_len = intended.length();
        let moved = Vec3::new(
            position.x - input.position.x,
            0.0,
            position.z - input.position.z,
        )
        .length();
        let movement_ratio = if intended_len < 1e-6 {
            1.0
        } else {
            (moved / intended_len).clamp(0.0, 1.0)
        };

        CapsuleStepOutput {
            position,
            velocity_y,
            grounded,
            movement_ratio,
            collided,
        }
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        !self
            .blocks
            .iter()
            .any(|b| b.intersects_segment(from, to))
    }
}

impl NavMesh for FlatWorld {
    fn is_on_mesh(&self, point: Vec3) -> bool {
        self.in_bounds(point) && self.blocked_at(point).is_none()
    }

    fn nearest_point(&self, point: Vec3, radius: f32) -> Option<Vec3> {
        let clamped = self.clamp_to_bounds(point);
        if (clamped - point).length() > radius {
            return None;
        }
        if self.blocked_at(clamped).is_none() {
            return Some(Vec3::new(clamped.x, self.floor_y, clamped.z));
        }
        None
    }

    fn sample_height(&self, point: Vec3) -> Option<f32> {
        self.in_bounds(point).then_some(self.floor_y)
    }

    fn find_path(&self, from: Vec3, to: Vec3) -> Option<Vec<Vec3>> {
        if !self.is_on_mesh(to) {
            return None;
        }
        if self.line_of_sight(from + Vec3::Y * 0.5, to + Vec3::Y * 0.5) {
            return Some(vec![to]);
        }

        // Single-detour routing around the first blocking box.
        let blocker = self
            .blocks
            .iter()
            .find(|b| b.intersects_segment(from + Vec3::Y * 0.5, to + Vec3::Y * 0.5))?;
        let forward = (to - from).normalize_or_zero();
        let side = Vec3::new(-forward.z, 0.0, forward.x);
        let clearance = blocker.half_extents.x.max(blocker.half_extents.z) + 1.0;

        for offset in [side * clearance, side * -clearance] {
            let waypoint = blocker.center + offset;
            if !self.is_on_mesh(waypoint) {
                continue;
            }
            let eye = Vec3::Y * 0.5;
            if self.line_of_sight(from + eye, waypoint + eye)
                && self.line_of_sight(waypoint + eye, to + eye)
            {
                return Some(vec![
                    Vec3::new(waypoint.x, self.floor_y, waypoint.z),
                    to,
                ]);
            }
        }
        None
    }

    fn validate_movement(&self, from: Vec3, to: Vec3) -> NavMoveResult {
        let (position, collided) = self.walk(from, to);
        let position = Vec3::new(position.x, self.floor_y, position.z);

        let intended = Vec3::new(to.x - from.x, 0.0, to.z - from.z).length();
        let moved = Vec3::new(position.x - from.x, 0.0, position.z - from.z).length();
        let movement_ratio = if intended < 1e-6 {
            1.0
        } else {
            (moved / intended).clamp(0.0, 1.0)
        };

        let cell_x = (position.x / 4.0).floor() as i32 as u32 as u64;
        let cell_z = (position.z / 4.0).floor() as i32 as u32 as u64;

        NavMoveResult {
            position,
            node_ref: (cell_x << 32) | cell_z,
            collided,
            movement_ratio,
        }
    }
}
