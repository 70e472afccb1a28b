mod ability_prediction;
mod event_stream;
mod movement;

pub use ability_prediction::AbilityPrediction;
pub use event_stream::{BatchSource, EventStreamClient, ResyncRequest};
pub use movement::MovementPredictor;
