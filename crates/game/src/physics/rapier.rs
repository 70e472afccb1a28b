use glam::Vec3;
use rapier3d::control::KinematicCharacterController;
use rapier3d::prelude::*;

use super::{CapsuleStepInput, CapsuleStepOutput, CollisionWorld};

const GRAVITY: f32 = 20.0;
const JUMP_VELOCITY: f32 = 8.0;
const CAPSULE_RADIUS: f32 = 0.3;
const CAPSULE_HALF_HEIGHT: f32 = 0.6;

/// Static collision geometry queried through rapier: capsule character steps
/// and line-of-sight rays. Geometry is committed once at startup and never
/// mutated afterwards.
pub struct RapierWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    controller: KinematicCharacterController,
    capsule: SharedShape,
}

impl RapierWorld {
    pub fn builder() -> RapierWorldBuilder {
        RapierWorldBuilder {
            colliders: ColliderSet::new(),
        }
    }

    fn query_pipeline(&self) -> QueryPipeline<'_> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            QueryFilter::default(),
        )
    }
}

pub struct RapierWorldBuilder {
    colliders: ColliderSet,
}

impl RapierWorldBuilder {
    pub fn ground(mut self, y: f32, half_size: f32) -> Self {
        let collider = ColliderBuilder::cuboid(half_size, 0.1, half_size)
            .translation(Vector::new(0.0, y - 0.1, 0.0))
            .build();
        self.colliders.insert(collider);
        self
    }

    pub fn static_box(mut self, center: Vec3, half_extents: Vec3) -> Self {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(Vector::new(center.x, center.y, center.z))
            .build();
        self.colliders.insert(collider);
        self
    }

    /// Runs one pipeline step so the broad phase indexes the committed
    /// geometry before any query runs.
    pub fn build(self) -> RapierWorld {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = crate::constants::TICK_MS as f32 / 1000.0;

        let mut world = RapierWorld {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: self.colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            controller: KinematicCharacterController::default(),
            capsule: SharedShape::capsule_y(CAPSULE_HALF_HEIGHT, CAPSULE_RADIUS),
        };

        world.pipeline.step(
            Vector::new(0.0, 0.0, 0.0),
            &world.integration_parameters,
            &mut world.islands,
            &mut world.broad_phase,
            &mut world.narrow_phase,
            &mut world.bodies,
            &mut world.colliders,
            &mut world.impulse_joints,
            &mut world.multibody_joints,
            &mut world.ccd_solver,
            &(),
            &(),
        );

        world
    }
}

impl CollisionWorld for RapierWorld {
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

        let mut velocity_y = input.velocity_y;
        if input.grounded && input.jump_pressed {
            velocity_y = JUMP_VELOCITY;
        }
        velocity_y -= GRAVITY * dt;

        let intended = dir * input.speed * dt;
        let desired = Vector::new(intended.x, velocity_y * dt, intended.z);

        let center = input.position + Vec3::Y * (CAPSULE_HALF_HEIGHT + CAPSULE_RADIUS);
        let pose = Pose::from_parts(
            Vector::new(center.x, center.y, center.z),
            Rotation::IDENTITY,
        );

        let movement = self.controller.move_shape(
            dt,
            &self.query_pipeline(),
            self.capsule.as_ref(),
            &pose,
            desired,
            |_collision| {},
        );

        let applied = Vec3::new(
            movement.translation.x,
            movement.translation.y,
            movement.translation.z,
        );
        let position = input.position + applied;

        let grounded = movement.grounded;
        let velocity_y = if grounded { 0.0 } else { velocity_y };

        let intended_len = Vec3::new(intended.x, 0.0, intended.z).length();
        let moved = Vec3::new(applied.x, 0.0, applied.z).length();
        let movement_ratio = if intended_len < 1e-6 {
            1.0
        } else {
            (moved / intended_len).clamp(0.0, 1.0)
        };
        let collided = intended_len > 1e-6 && movement_ratio < 0.999;

        CapsuleStepOutput {
            position,
            velocity_y,
            grounded,
            movement_ratio,
            collided,
        }
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance < 1e-6 {
            return true;
        }
        let direction = delta / distance;

        let ray = Ray::new(
            Vector::new(from.x, from.y, from.z),
            Vector::new(direction.x, direction.y, direction.z),
        );
        self.query_pipeline().cast_ray(&ray, distance, true).is_none()
    }
}
