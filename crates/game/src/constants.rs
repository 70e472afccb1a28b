//! Authoritative tuning constants for the zone simulation.

/// Fixed simulation timestep.
pub const TICK_MS: u64 = 50;

pub const GCD_SECONDS: f32 = 2.5;
pub const GCD_MS: u64 = (GCD_SECONDS * 1000.0) as u64;

/// Universal gate triggered by instant and short casts.
pub const INTERNAL_COOLDOWN_MS: u64 = 500;

/// Tail portion of a cast/GCD during which a follow-up request may be buffered.
pub const BUFFER_OPEN_MS: u64 = 2500;

pub const MAX_INPUT_CATCH_UP_TICKS: u32 = 5;
pub const MAX_INPUT_LAG_TICKS: u64 = 10;
pub const MAX_PENDING_INPUTS: usize = 64;

/// Squared-compared server-side drift limit before a snap is forced.
pub const SERVER_SNAP_DISTANCE: f32 = 2.0;
pub const CLIENT_RECONCILE_DISTANCE_EPSILON: f32 = 0.05;
pub const NAVMESH_RECOVERY_DISTANCE: f32 = 5.0;

pub const MAX_TRACKED_REQUEST_PREDICTIONS: usize = 64;

/// Broadcast radius for range-limited event relevance.
pub const DEFAULT_EVENT_RANGE: f32 = 75.0;

pub const LOS_CELL_SIZE: f32 = 8.0;
pub const LOS_MAX_RANGE: f32 = 40.0;
pub const LOS_UPDATE_STRIDE: u64 = 4;
pub const LOS_MOVE_THRESHOLD: f32 = 1.0;
pub const LOS_MAX_STALE_TICKS: u64 = 20;

pub const PLAYER_SPEED: f32 = 5.0;
pub const PLAYER_SPRINT_MULTIPLIER: f32 = 1.6;

pub const MELEE_RANGE: f32 = 2.0;

pub const DAMAGE_AGGRO_MULTIPLIER: f32 = 1.0;
pub const HEALING_AGGRO_MULTIPLIER: f32 = 0.5;
pub const STATUS_AGGRO_AMOUNT: f32 = 25.0;

pub const EVENT_LOG_CAPACITY: usize = 1024;

/// Disconnected players are retained this long before removal.
pub const DISCONNECT_GRACE_MS: u64 = 120_000;
pub const NPC_RESPAWN_DELAY_MS: u64 = 15_000;
