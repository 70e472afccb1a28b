use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::mpsc;

use stormreach::constants::TICK_MS;
use stormreach::net::{ClientPacket, ServerPacket};
use stormreach::zone::Zone;
use stormreach::MobId;

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};

/// Commands from the session layer into a zone task. The room framework
/// delivers these; messages cross the boundary as wire bytes and the zone
/// task is the only writer of zone state.
#[derive(Debug)]
pub enum HostCommand {
    Connect {
        session_id: u64,
        out: mpsc::UnboundedSender<Vec<u8>>,
    },
    Reconnect {
        session_id: u64,
        out: mpsc::UnboundedSender<Vec<u8>>,
    },
    Disconnect {
        session_id: u64,
    },
    Message {
        session_id: u64,
        payload: Vec<u8>,
    },
    Shutdown,
}

#[derive(Debug)]
struct Session {
    mob_id: MobId,
    out: Option<mpsc::UnboundedSender<Vec<u8>>>,
    disconnected_since_ms: Option<u64>,
}

/// Drives one zone on a fixed tick, owning its session registry and the
/// disconnect grace timers.
pub struct ZoneHost {
    zone: Zone,
    config: ServerConfig,
    sessions: HashMap<u64, Session>,
    mob_to_session: HashMap<MobId, u64>,
    commands: mpsc::UnboundedReceiver<HostCommand>,
    pending_events: VecDeque<ServerEvent>,
}

impl ZoneHost {
    pub fn new(zone: Zone, config: ServerConfig) -> (Self, mpsc::UnboundedSender<HostCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                zone,
                config,
                sessions: HashMap::new(),
                mob_to_session: HashMap::new(),
                commands: receiver,
                pending_events: VecDeque::new(),
            },
            sender,
        )
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        log::info!(
            "zone {} ({} npcs) running",
            self.zone.zone_id(),
            self.zone.mobs().npc_ids().len()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                    self.log_events();
                }
                command = self.commands.recv() => match command {
                    None | Some(HostCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                }
            }
        }

        log::info!("zone {} stopped", self.zone.zone_id());
    }

    fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Connect { session_id, out } => self.connect(session_id, out),
            HostCommand::Reconnect { session_id, out } => self.reconnect(session_id, out),
            HostCommand::Disconnect { session_id } => self.disconnect(session_id),
            HostCommand::Message {
                session_id,
                payload,
            } => {
                let Some(session) = self.sessions.get(&session_id) else {
                    log::warn!("message from unknown session {session_id}");
                    return;
                };
                if session.disconnected_since_ms.is_some() {
                    return;
                }
                // malformed frames are dropped here, never handed to the zone
                match ClientPacket::deserialize(&payload) {
                    Ok(packet) => self.zone.enqueue_message(session.mob_id, packet.message),
                    Err(error) => {
                        log::warn!("dropping bad frame from session {session_id}: {error}");
                    }
                }
            }
            HostCommand::Shutdown => {}
        }
    }

    fn connect(&mut self, session_id: u64, out: mpsc::UnboundedSender<Vec<u8>>) {
        if self.sessions.contains_key(&session_id) {
            self.reconnect(session_id, out);
            return;
        }
        let connected = self
            .sessions
            .values()
            .filter(|s| s.disconnected_since_ms.is_none())
            .count();
        if connected >= self.config.max_players {
            self.pending_events.push_back(ServerEvent::ConnectionDenied {
                session_id,
                reason: "zone full".to_string(),
            });
            return;
        }

        let mob_id = self.zone.connect_player();
        self.sessions.insert(
            session_id,
            Session {
                mob_id,
                out: Some(out),
                disconnected_since_ms: None,
            },
        );
        self.mob_to_session.insert(mob_id, session_id);
        self.pending_events
            .push_back(ServerEvent::PlayerConnected { session_id, mob_id });
    }

    fn reconnect(&mut self, session_id: u64, out: mpsc::UnboundedSender<Vec<u8>>) {
        match self.sessions.get_mut(&session_id) {
            Some(session) => {
                session.out = Some(out);
                session.disconnected_since_ms = None;
                self.pending_events.push_back(ServerEvent::PlayerReconnected {
                    session_id,
                    mob_id: session.mob_id,
                });
            }
            None => self.connect(session_id, out),
        }
    }

    fn disconnect(&mut self, session_id: u64) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.out = None;
            session.disconnected_since_ms = Some(self.zone.now_ms());
            self.pending_events
                .push_back(ServerEvent::PlayerDisconnected {
                    session_id,
                    reason: DisconnectReason::Graceful,
                });
        }
    }

    fn tick(&mut self) {
        self.expire_grace_periods();
        self.zone.fixed_tick();

        for (mob_id, message) in self.zone.drain_outbound() {
            let Some(&session_id) = self.mob_to_session.get(&mob_id) else {
                continue;
            };
            let Some(session) = self.sessions.get_mut(&session_id) else {
                continue;
            };
            let Some(out) = &session.out else {
                continue;
            };

            let bytes = match ServerPacket::new(message).serialize() {
                Ok(bytes) => bytes,
                Err(error) => {
                    log::error!("failed to encode frame for session {session_id}: {error}");
                    continue;
                }
            };
            if out.send(bytes).is_err() {
                // transport died without a disconnect; start the grace timer
                session.out = None;
                session.disconnected_since_ms = Some(self.zone.now_ms());
                self.pending_events
                    .push_back(ServerEvent::PlayerDisconnected {
                        session_id,
                        reason: DisconnectReason::TransportLost,
                    });
            }
        }
    }

    fn expire_grace_periods(&mut self) {
        let now = self.zone.now_ms();
        let expired: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, s)| {
                s.disconnected_since_ms
                    .is_some_and(|since| now.saturating_sub(since) >= self.config.grace_period_ms)
            })
            .map(|(&id, _)| id)
            .collect();

        for session_id in expired {
            if let Some(session) = self.sessions.remove(&session_id) {
                self.zone.remove_mob(session.mob_id);
                self.mob_to_session.remove(&session.mob_id);
                self.pending_events.push_back(ServerEvent::PlayerRemoved {
                    session_id,
                    mob_id: session.mob_id,
                });
            }
        }
    }

    fn log_events(&mut self) {
        while let Some(event) = self.pending_events.pop_front() {
            match event {
                ServerEvent::PlayerConnected { session_id, mob_id } => {
                    log::info!("session {session_id} connected as mob {mob_id}");
                }
                ServerEvent::PlayerReconnected { session_id, mob_id } => {
                    log::info!("session {session_id} reconnected to mob {mob_id}");
                }
                ServerEvent::PlayerDisconnected { session_id, reason } => {
                    log::info!("session {session_id} {}", reason.as_str());
                }
                ServerEvent::PlayerRemoved { session_id, mob_id } => {
                    log::info!("session {session_id} grace expired, removed mob {mob_id}");
                }
                ServerEvent::ConnectionDenied { session_id, reason } => {
                    log::warn!("session {session_id} denied: {reason}");
                }
            }
        }
    }
}
