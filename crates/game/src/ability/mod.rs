mod def;
mod engine;
mod request;
mod result;

pub use def::{
    AbilityBook, AbilityCost, AbilityDef, AbilityEffect, TAG_ATTACK, TAG_MOVEMENT, TAG_SPELL,
};
pub use engine::{AbilityEngine, ActiveCast, BufferedRequest, ResolvedCast};
pub use request::{
    AbilityAck, AbilityCancelRequest, AbilityUseRequest, CancelReason, RejectReason,
};
pub use result::{AbilityResult, CastRng, OutcomeKind, TargetOutcome, cast_seed};
