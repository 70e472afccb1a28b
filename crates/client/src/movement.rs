use std::collections::VecDeque;

use glam::Vec3;

use stormreach::constants::{
    CLIENT_RECONCILE_DISTANCE_EPSILON, MAX_PENDING_INPUTS, PLAYER_SPEED,
    PLAYER_SPRINT_MULTIPLIER, TICK_MS,
};
use stormreach::net::{ClientMessage, MoveMessage};
use stormreach::physics::{CapsuleStepInput, CollisionWorld};

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    seq: u64,
    direction: Vec3,
    jump_pressed: bool,
    is_sprinting: bool,
}

/// Client-side movement prediction with the snap-echo half of the server's
/// snap-lock protocol: inputs step a local capsule immediately, the server
/// state either confirms them or snaps the client back.
pub struct MovementPredictor {
    position: Vec3,
    velocity_y: f32,
    grounded: bool,
    next_seq: u64,
    pending: VecDeque<PendingMove>,
}

impl MovementPredictor {
    pub fn new(spawn_position: Vec3) -> Self {
        Self {
            position: spawn_position,
            velocity_y: 0.0,
            grounded: true,
            next_seq: 0,
            pending: VecDeque::with_capacity(MAX_PENDING_INPUTS),
        }
    }

    pub fn predicted_position(&self) -> Vec3 {
        self.position
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Steps the local capsule and produces the wire message carrying the
    /// predicted result.
    pub fn predict(
        &mut self,
        direction: Vec3,
        jump_pressed: bool,
        is_sprinting: bool,
        client_tick: u64,
        collision: &dyn CollisionWorld,
    ) -> ClientMessage {
        self.next_seq += 1;
        let seq = self.next_seq;

        self.step(direction, jump_pressed, is_sprinting, collision);

        self.pending.push_back(PendingMove {
            seq,
            direction,
            jump_pressed,
            is_sprinting,
        });
        while self.pending.len() > MAX_PENDING_INPUTS {
            self.pending.pop_front();
        }

        ClientMessage::Move(MoveMessage {
            direction_x: direction.x,
            direction_z: direction.z,
            jump_pressed,
            is_sprinting,
            seq,
            tick: client_tick,
            predicted_x: self.position.x,
            predicted_y: self.position.y,
            predicted_z: self.position.z,
        })
    }

    /// Replicated-state reconciliation: inside the epsilon the prediction
    /// stands; beyond it the server position is adopted and the pending
    /// inputs replayed on top.
    pub fn reconcile(&mut self, server_position: Vec3, collision: &dyn CollisionWorld) {
        if (server_position - self.position).length() <= CLIENT_RECONCILE_DISTANCE_EPSILON {
            return;
        }

        self.position = server_position;
        self.velocity_y = 0.0;
        self.grounded = true;
        let replay: Vec<PendingMove> = self.pending.iter().copied().collect();
        for pending in replay {
            self.step(
                pending.direction,
                pending.jump_pressed,
                pending.is_sprinting,
                collision,
            );
        }
    }

    /// Authoritative snap: adopt the server position, drop everything in
    /// flight, and echo the seq so the server unlocks input processing.
    pub fn on_snap(&mut self, x: f32, y: f32, z: f32, seq: u64) -> ClientMessage {
        self.position = Vec3::new(x, y, z);
        self.velocity_y = 0.0;
        self.grounded = true;
        self.pending.clear();
        ClientMessage::SnapAck { seq, x, y, z }
    }

    fn step(
        &mut self,
        direction: Vec3,
        jump_pressed: bool,
        is_sprinting: bool,
        collision: &dyn CollisionWorld,
    ) {
        let speed = if is_sprinting {
            PLAYER_SPEED * PLAYER_SPRINT_MULTIPLIER
        } else {
            PLAYER_SPEED
        };
        let out = collision.step_capsule(&CapsuleStepInput {
            position: self.position,
            direction,
            speed,
            delta_time_ms: TICK_MS,
            jump_pressed,
            velocity_y: self.velocity_y,
            grounded: self.grounded,
        });
        self.position = out.position;
        self.velocity_y = out.velocity_y;
        self.grounded = out.grounded;
    }
}
