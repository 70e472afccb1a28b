use stormreach::constants::DISCONNECT_GRACE_MS;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_players: usize,
    /// How long a disconnected player's mob is retained before removal.
    pub grace_period_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: 64,
            grace_period_ms: DISCONNECT_GRACE_MS,
        }
    }
}
