use crate::mob::MobId;
use crate::targeting::TargetSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Manual,
    Movement,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbilityUseRequest {
    pub request_id: String,
    pub sequence: u64,
    pub client_tick: u64,
    pub actor_id: MobId,
    pub ability_id: String,
    pub target: TargetSpec,
    pub client_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbilityCancelRequest {
    pub request_id: String,
    pub sequence: u64,
    pub client_tick: u64,
    pub actor_id: MobId,
    pub reason: CancelReason,
    pub client_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Illegal,
    Cooldown,
    Resources,
    OutOfRange,
    BufferFull,
    BufferWindowClosed,
    Stunned,
    Silenced,
    Disarmed,
    Rooted,
    Other,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Illegal => "illegal",
            Self::Cooldown => "cooldown",
            Self::Resources => "resources",
            Self::OutOfRange => "out_of_range",
            Self::BufferFull => "buffer_full",
            Self::BufferWindowClosed => "buffer_window_closed",
            Self::Stunned => "stunned",
            Self::Silenced => "silenced",
            Self::Disarmed => "disarmed",
            Self::Rooted => "rooted",
            Self::Other => "other",
        }
    }
}

/// Exactly one ack is produced per use request, synchronously on rejection
/// or immediate acceptance, deferred for buffered requests. Cancels never
/// produce one.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityAck {
    pub request_id: String,
    pub sequence: u64,
    pub accepted: bool,
    pub server_time_ms: u64,
    pub server_tick: u64,
    pub cast_start_time_ms: u64,
    pub cast_end_time_ms: u64,
    pub gcd_start_time_ms: Option<u64>,
    pub gcd_end_time_ms: Option<u64>,
    pub reject_reason: Option<RejectReason>,
}

impl AbilityAck {
    pub fn accepted(
        request: &AbilityUseRequest,
        server_time_ms: u64,
        server_tick: u64,
        cast_start_time_ms: u64,
        cast_end_time_ms: u64,
        gcd_window: Option<(u64, u64)>,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            sequence: request.sequence,
            accepted: true,
            server_time_ms,
            server_tick,
            cast_start_time_ms,
            cast_end_time_ms,
            gcd_start_time_ms: gcd_window.map(|(start, _)| start),
            gcd_end_time_ms: gcd_window.map(|(_, end)| end),
            reject_reason: None,
        }
    }

    pub fn rejected(
        request: &AbilityUseRequest,
        server_time_ms: u64,
        server_tick: u64,
        reason: RejectReason,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            sequence: request.sequence,
            accepted: false,
            server_time_ms,
            server_tick,
            cast_start_time_ms: 0,
            cast_end_time_ms: 0,
            gcd_start_time_ms: None,
            gcd_end_time_ms: None,
            reject_reason: Some(reason),
        }
    }
}
