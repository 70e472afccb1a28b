use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::ability::{
    AbilityAck, AbilityCancelRequest, AbilityUseRequest, CancelReason, RejectReason,
};
use crate::event::EventLogEntry;
use crate::mob::MobId;
use crate::movement::QueuedMoveInput;
use crate::targeting::TargetSpec;

pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x5354524D;

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct MoveMessage {
    pub direction_x: f32,
    pub direction_z: f32,
    pub jump_pressed: bool,
    pub is_sprinting: bool,
    pub seq: u64,
    pub tick: u64,
    pub predicted_x: f32,
    pub predicted_y: f32,
    pub predicted_z: f32,
}

impl MoveMessage {
    pub fn to_input(&self) -> QueuedMoveInput {
        QueuedMoveInput {
            direction_x: self.direction_x,
            direction_z: self.direction_z,
            jump_pressed: self.jump_pressed,
            is_sprinting: self.is_sprinting,
            seq: self.seq,
            tick: self.tick,
            predicted: Vec3::new(self.predicted_x, self.predicted_y, self.predicted_z),
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AbilityUseMessage {
    pub request_id: String,
    pub sequence: u64,
    pub client_tick: u64,
    pub actor_id: MobId,
    pub ability_id: String,
    pub target_entity_id: Option<MobId>,
    pub target_point: Option<[f32; 3]>,
    pub direction: Option<[f32; 3]>,
    pub client_time_ms: u64,
}

impl AbilityUseMessage {
    pub fn to_request(&self) -> AbilityUseRequest {
        AbilityUseRequest {
            request_id: self.request_id.clone(),
            sequence: self.sequence,
            client_tick: self.client_tick,
            actor_id: self.actor_id,
            ability_id: self.ability_id.clone(),
            target: TargetSpec {
                target_entity_id: self.target_entity_id,
                target_point: self.target_point.map(Vec3::from),
                direction: self.direction.map(Vec3::from),
            },
            client_time_ms: self.client_time_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum WireCancelReason {
    Manual,
    Movement,
    Other,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AbilityCancelMessage {
    pub request_id: String,
    pub sequence: u64,
    pub client_tick: u64,
    pub actor_id: MobId,
    pub reason: WireCancelReason,
    pub client_time_ms: u64,
}

impl AbilityCancelMessage {
    pub fn to_request(&self) -> AbilityCancelRequest {
        AbilityCancelRequest {
            request_id: self.request_id.clone(),
            sequence: self.sequence,
            client_tick: self.client_tick,
            actor_id: self.actor_id,
            reason: match self.reason {
                WireCancelReason::Manual => CancelReason::Manual,
                WireCancelReason::Movement => CancelReason::Movement,
                WireCancelReason::Other => CancelReason::Other,
            },
            client_time_ms: self.client_time_ms,
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ClientMessage {
    Move(MoveMessage),
    AbilityUse(AbilityUseMessage),
    AbilityCancel(AbilityCancelMessage),
    TargetChange { target_entity_id: Option<MobId> },
    EventStreamResyncRequest { since_event_id: u64 },
    SnapAck { seq: u64, x: f32, y: f32, z: f32 },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AbilityAckMessage {
    pub request_id: String,
    pub sequence: u64,
    pub accepted: bool,
    pub server_time_ms: u64,
    pub server_tick: u64,
    pub cast_start_time_ms: u64,
    pub cast_end_time_ms: u64,
    pub gcd_start_time_ms: Option<u64>,
    pub gcd_end_time_ms: Option<u64>,
    pub reject_reason: Option<String>,
}

impl AbilityAckMessage {
    pub fn from_ack(ack: &AbilityAck) -> Self {
        Self {
            request_id: ack.request_id.clone(),
            sequence: ack.sequence,
            accepted: ack.accepted,
            server_time_ms: ack.server_time_ms,
            server_tick: ack.server_tick,
            cast_start_time_ms: ack.cast_start_time_ms,
            cast_end_time_ms: ack.cast_end_time_ms,
            gcd_start_time_ms: ack.gcd_start_time_ms,
            gcd_end_time_ms: ack.gcd_end_time_ms,
            reject_reason: ack.reject_reason.map(|r| r.as_str().to_string()),
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.reject_reason.as_deref().map(|s| match s {
            "illegal" => RejectReason::Illegal,
            "cooldown" => RejectReason::Cooldown,
            "resources" => RejectReason::Resources,
            "out_of_range" => RejectReason::OutOfRange,
            "buffer_full" => RejectReason::BufferFull,
            "buffer_window_closed" => RejectReason::BufferWindowClosed,
            "stunned" => RejectReason::Stunned,
            "silenced" => RejectReason::Silenced,
            "disarmed" => RejectReason::Disarmed,
            "rooted" => RejectReason::Rooted,
            _ => RejectReason::Other,
        })
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EventStreamBatchMessage {
    pub from_event_id: u64,
    pub to_event_id: u64,
    pub server_tick: u64,
    pub events: Vec<EventLogEntry>,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AggroEntry {
    pub mob_id: MobId,
    pub percent: u8,
}

/// Per-mob replicated fields, projected from authoritative state each tick.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct MobReplica {
    pub id: MobId,
    pub is_npc: bool,
    pub faction_id: u32,
    pub position: [f32; 3],
    pub facing_yaw: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub cast_start_time_ms: u64,
    pub cast_end_time_ms: u64,
    pub cast_ability_id: String,
    pub in_combat: bool,
    pub visible_targets: Vec<MobId>,
    pub aggro: Vec<AggroEntry>,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ReplicatedState {
    pub server_tick: u64,
    pub server_time_ms: u64,
    pub mobs: Vec<MobReplica>,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ServerMessage {
    Snap {
        x: f32,
        y: f32,
        z: f32,
        seq: u64,
    },
    AbilityAck(AbilityAckMessage),
    EventStreamBatch(EventStreamBatchMessage),
    EventStreamResyncResponse(EventStreamBatchMessage),
    State(ReplicatedState),
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("bad packet header (magic {magic:#x}, version {version})")]
    BadHeader { magic: u32, version: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
}

impl PacketHeader {
    pub fn new() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-to-server wire frame. The session layer carries these as bytes;
/// frames with an invalid header are dropped at the host boundary.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ClientPacket {
    pub header: PacketHeader,
    pub message: ClientMessage,
}

impl ClientPacket {
    pub fn new(message: ClientMessage) -> Self {
        Self {
            header: PacketHeader::new(),
            message,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Serialize)
    }

    /// Decodes and validates the header in one step.
    pub fn deserialize(data: &[u8]) -> Result<Self, WireError> {
        let packet: Self =
            rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Deserialize)?;
        if !packet.header.is_valid() {
            return Err(WireError::BadHeader {
                magic: packet.header.magic,
                version: packet.header.version,
            });
        }
        Ok(packet)
    }
}

/// Server-to-client wire frame.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ServerPacket {
    pub header: PacketHeader,
    pub message: ServerMessage,
}

impl ServerPacket {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            header: PacketHeader::new(),
            message,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, WireError> {
        let packet: Self =
            rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Deserialize)?;
        if !packet.header.is_valid() {
            return Err(WireError::BadHeader {
                magic: packet.header.magic,
                version: packet.header.version,
            });
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_packet_roundtrip() {
        let packet = ClientPacket::new(ClientMessage::AbilityUse(AbilityUseMessage {
            request_id: "req-1".into(),
            sequence: 3,
            client_tick: 12,
            actor_id: 7,
            ability_id: "shield_bash".into(),
            target_entity_id: Some(9),
            target_point: None,
            direction: Some([0.0, 0.0, 1.0]),
            client_time_ms: 1234,
        }));

        let bytes = packet.serialize().unwrap();
        let decoded = ClientPacket::deserialize(&bytes).unwrap();
        assert!(decoded.header.is_valid());
        match decoded.message {
            ClientMessage::AbilityUse(use_msg) => {
                assert_eq!(use_msg.request_id, "req-1");
                let request = use_msg.to_request();
                assert_eq!(request.target.target_entity_id, Some(9));
                assert!(request.target.target_point.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn server_packet_roundtrip() {
        let packet = ServerPacket::new(ServerMessage::Snap {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            seq: 9,
        });

        let bytes = packet.serialize().unwrap();
        let decoded = ServerPacket::deserialize(&bytes).unwrap();
        match decoded.message {
            ServerMessage::Snap { x, y, z, seq } => {
                assert_eq!((x, y, z, seq), (1.0, 2.0, 3.0, 9));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut packet = ClientPacket::new(ClientMessage::TargetChange {
            target_entity_id: None,
        });
        packet.header.magic = 0xdeadbeef;

        let bytes = packet.serialize().unwrap();
        assert!(matches!(
            ClientPacket::deserialize(&bytes),
            Err(WireError::BadHeader { .. })
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(ClientPacket::deserialize(&[0x13, 0x37, 0x00]).is_err());
    }

    #[test]
    fn ack_reason_survives_wire_names() {
        for reason in [
            RejectReason::Illegal,
            RejectReason::Cooldown,
            RejectReason::Resources,
            RejectReason::OutOfRange,
            RejectReason::BufferFull,
            RejectReason::BufferWindowClosed,
            RejectReason::Stunned,
            RejectReason::Silenced,
            RejectReason::Disarmed,
            RejectReason::Rooted,
            RejectReason::Other,
        ] {
            let msg = AbilityAckMessage {
                request_id: "r".into(),
                sequence: 1,
                accepted: false,
                server_time_ms: 0,
                server_tick: 0,
                cast_start_time_ms: 0,
                cast_end_time_ms: 0,
                gcd_start_time_ms: None,
                gcd_end_time_ms: None,
                reject_reason: Some(reason.as_str().to_string()),
            };
            assert_eq!(msg.reject_reason(), Some(reason));
        }
    }
}
