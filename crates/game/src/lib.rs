pub mod ability;
pub mod aggro;
pub mod ai;
pub mod combat;
pub mod constants;
pub mod event;
pub mod los;
pub mod mob;
pub mod movement;
pub mod net;
pub mod physics;
pub mod stats;
pub mod status;
pub mod targeting;
pub mod zone;

pub use ability::{
    AbilityAck, AbilityBook, AbilityCancelRequest, AbilityDef, AbilityEngine, AbilityUseRequest,
    CancelReason, RejectReason, ResolvedCast,
};
pub use aggro::AggroTable;
pub use ai::{AbilityIntent, AbilityIntentSystem, AiController, NpcAi};
pub use combat::CombatEngine;
pub use event::{EventCategory, EventLog, EventLogEntry, EventLogError, GameEvent};
pub use los::LineOfSightTracker;
pub use mob::{Mob, MobId, MobKind, Mobs};
pub use movement::{MovementController, PlayerPending, QueuedMoveInput, SnapTarget};
pub use net::{ClientMessage, ClientPacket, ReplicatedState, ServerMessage, ServerPacket};
pub use physics::{CollisionWorld, FlatWorld, NavMesh, RapierWorld};
pub use stats::{PrimaryStats, Resources, StatsController};
pub use status::{StatusController, StatusEffectDef};
pub use targeting::{TargetSpec, resolve_targets};
pub use zone::{NpcSpawnDef, Zone, ZoneDefinition};
