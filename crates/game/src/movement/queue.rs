use std::collections::VecDeque;

use glam::Vec3;

use crate::constants::MAX_PENDING_INPUTS;

#[derive(Debug, Clone, Copy)]
pub struct QueuedMoveInput {
    pub direction_x: f32,
    pub direction_z: f32,
    pub jump_pressed: bool,
    pub is_sprinting: bool,
    pub seq: u64,
    pub tick: u64,
    pub predicted: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    pub position: Vec3,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputCounters {
    pub processed: u64,
    pub dropped_stale: u64,
    pub dropped_overflow: u64,
    pub dropped_on_snap: u64,
    pub snaps_issued: u64,
    pub idle_ticks: u64,
}

/// Per-player pending-input state: the bounded FIFO written by the network
/// layer, the catch-up budget, and the snap-lock protocol. While snap-locked
/// the queue stays empty until the client echoes the snapped seq.
#[derive(Debug, Default)]
pub struct PlayerPending {
    inputs: VecDeque<QueuedMoveInput>,
    pub input_budget_ticks: u32,
    pub client_tick_offset: Option<i64>,
    pub last_processed_seq: u64,
    pub snap_locked: bool,
    pub snap_target: Option<SnapTarget>,
    pub snap_pending: Option<SnapTarget>,
    pub counters: InputCounters,
}

impl PlayerPending {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the input was not enqueued.
    pub fn push_input(&mut self, input: QueuedMoveInput) -> bool {
        if self.snap_locked {
            self.counters.dropped_on_snap += 1;
            return false;
        }
        if self.inputs.len() >= MAX_PENDING_INPUTS {
            self.counters.dropped_overflow += 1;
            return false;
        }
        self.inputs.push_back(input);
        true
    }

    pub fn queue_len(&self) -> usize {
        self.inputs.len()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn front(&self) -> Option<&QueuedMoveInput> {
        self.inputs.front()
    }

    pub fn take_inputs(&mut self) -> VecDeque<QueuedMoveInput> {
        std::mem::take(&mut self.inputs)
    }

    pub fn restore_inputs(&mut self, inputs: VecDeque<QueuedMoveInput>) {
        self.inputs = inputs;
    }

    /// Locks the player and records the snap to deliver at end of tick. Any
    /// queued inputs are discarded by the caller.
    pub fn lock_for_snap(&mut self, target: SnapTarget) {
        self.snap_locked = true;
        self.snap_target = Some(target);
        self.snap_pending = Some(target);
        self.counters.snaps_issued += 1;
        self.inputs.clear();
    }

    pub fn take_snap_pending(&mut self) -> Option<SnapTarget> {
        self.snap_pending.take()
    }

    /// Client echo of the snapped position. Unlocks only on a matching seq.
    pub fn acknowledge_snap(&mut self, seq: u64) -> bool {
        if self.snap_target.is_some_and(|t| t.seq == seq) {
            self.snap_locked = false;
            self.snap_target = None;
            self.snap_pending = None;
            return true;
        }
        false
    }
}
