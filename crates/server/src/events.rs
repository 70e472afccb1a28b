use stormreach::MobId;

#[derive(Debug, Clone)]
pub enum ServerEvent {
    PlayerConnected {
        session_id: u64,
        mob_id: MobId,
    },
    PlayerReconnected {
        session_id: u64,
        mob_id: MobId,
    },
    PlayerDisconnected {
        session_id: u64,
        reason: DisconnectReason,
    },
    PlayerRemoved {
        session_id: u64,
        mob_id: MobId,
    },
    ConnectionDenied {
        session_id: u64,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    TransportLost,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::TransportLost => "lost transport",
        }
    }
}
