mod protocol;

pub use protocol::{
    AbilityAckMessage, AbilityCancelMessage, AbilityUseMessage, AggroEntry, ClientMessage,
    ClientPacket, EventStreamBatchMessage, MobReplica, MoveMessage, PROTOCOL_MAGIC,
    PROTOCOL_VERSION, PacketHeader, ReplicatedState, ServerMessage, ServerPacket,
    WireCancelReason, WireError,
};
