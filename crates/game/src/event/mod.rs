mod log;
mod types;

pub use log::{EventLog, EventLogError};
pub use types::{
    EffectOutcome, EventCategory, EventLogEntry, ExitCombatReason, GameEvent, InterruptReason,
};
