//! Runtime configuration for the card server

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;

/// Tunables for the listener, the registries and the timeout sweeper
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, `host:port`
    pub bind_addr: String,
    /// Size of the session table (concurrent players, including those
    /// inside their reconnect grace window)
    pub max_sessions: usize,
    /// Size of the room table
    pub max_rooms: usize,
    /// How often the sweeper pings sessions and checks timeouts
    pub sweep_interval: Duration,
    /// Silence after which a connected session is force-closed
    pub heartbeat_timeout: Duration,
    /// Time a disconnected session keeps its identity and seat
    pub reconnect_timeout: Duration,
    /// Shuffle the deck before dealing instead of dealing in build order
    pub shuffle_deck: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            max_sessions: 10,
            max_rooms: 7,
            sweep_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(10),
            reconnect_timeout: Duration::from_secs(120),
            shuffle_deck: false,
        }
    }
}
