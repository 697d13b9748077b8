//! Session table: one slot per logical player
//!
//! This module tracks every player slot on the server, including:
//! - The live connection handle, if any
//! - Identity (nickname and reconnect token) bound on first login
//! - Status within the lobby/room/game state machine
//! - Heartbeat and disconnect timestamps used by the sweeper
//!
//! A slot that loses its connection keeps its identity until the reconnect
//! grace window elapses, and cannot be handed to a new connection meanwhile.

use crate::connection::{Connection, ConnectionId, Outbox};
use crate::room_manager::RoomId;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::MessageType;
use std::time::{Duration, Instant};
use thiserror::Error;

pub type SessionId = usize;

/// Longest nickname accepted at login, in bytes
pub const NICK_MAX_LEN: usize = 31;
/// Length of the reconnect token handed out at first login
pub const TOKEN_LEN: usize = 10;

/// Position of a session in the lobby/room/game state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not logged in, or dropped and waiting for a reconnect
    Disconnected,
    /// Logged in, in the lobby
    Connected,
    InRoom,
    OnTurn,
    OnWait,
    /// In a game suspended because a player dropped
    Paused,
    /// In a room whose match just ended
    GameDone,
}

impl SessionStatus {
    /// True for the statuses that belong to a running match
    pub fn in_game(self) -> bool {
        matches!(
            self,
            SessionStatus::OnTurn | SessionStatus::OnWait | SessionStatus::Paused
        )
    }

    /// Word sent in the `OKAY` that follows a successful reconnect
    pub fn resume_marker(self) -> &'static str {
        match self {
            SessionStatus::OnTurn => "TURN",
            SessionStatus::OnWait => "WAIT",
            SessionStatus::Paused => "PAUSED",
            _ => "LOBBY",
        }
    }
}

/// One player slot
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub connection: Option<Connection>,
    pub nick: Option<String>,
    pub token: Option<String>,
    pub status: SessionStatus,
    /// Status to restore on reconnect or when a pause ends
    pub last_status: SessionStatus,
    pub last_heartbeat: Instant,
    pub disconnected_at: Option<Instant>,
    pub room: Option<RoomId>,
    pub invalid_messages: u32,
}

impl Session {
    fn empty(id: SessionId) -> Self {
        Self {
            id,
            connection: None,
            nick: None,
            token: None,
            status: SessionStatus::Disconnected,
            last_status: SessionStatus::Disconnected,
            last_heartbeat: Instant::now(),
            disconnected_at: None,
            room: None,
            invalid_messages: 0,
        }
    }

    /// Free slots have neither a connection nor an identity to reclaim
    pub fn is_free(&self) -> bool {
        self.connection.is_none() && self.nick.is_none()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_logged_in(&self) -> bool {
        self.nick.is_some()
    }

    pub fn nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("")
    }

    /// Records activity from the peer
    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// True if a connected peer has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.is_connected() && self.last_heartbeat.elapsed() > timeout
    }

    /// True if a dropped identity has outlived its reconnect window
    pub fn grace_expired(&self, timeout: Duration) -> bool {
        !self.is_connected()
            && self.is_logged_in()
            && self
                .disconnected_at
                .is_some_and(|at| at.elapsed() > timeout)
    }

    /// Saves the current status for later restoration. A paused session
    /// already holds the status it had before the pause.
    pub fn remember_status(&mut self) {
        if self.status != SessionStatus::Paused {
            self.last_status = self.status;
        }
    }

    /// Queues a frame if the session has a live connection
    pub fn notify(&self, outbox: &mut Outbox, msg_type: MessageType, payload: impl Into<String>) {
        if let Some(connection) = &self.connection {
            outbox.push(connection, msg_type, payload);
        }
    }
}

/// Parsed `LOGI` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRequest {
    New { nick: String },
    Reconnect { nick: String, token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("Nickname must be 1 to 31 characters")]
    BadNick,
    #[error("Invalid token format")]
    BadToken,
}

/// Parses `nick` or `nick|token`
pub fn parse_login(payload: &str) -> Result<LoginRequest, LoginError> {
    let (nick, token) = match payload.split_once('|') {
        Some((nick, token)) => (nick, Some(token)),
        None => (payload, None),
    };

    if nick.is_empty() || nick.len() > NICK_MAX_LEN {
        return Err(LoginError::BadNick);
    }

    match token {
        None => Ok(LoginRequest::New {
            nick: nick.to_string(),
        }),
        Some(token)
            if token.len() == TOKEN_LEN && token.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            Ok(LoginRequest::Reconnect {
                nick: nick.to_string(),
                token: token.to_string(),
            })
        }
        Some(_) => Err(LoginError::BadToken),
    }
}

/// Random alphanumeric reconnect token
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Fixed-size table of sessions
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: (0..capacity).map(Session::empty).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.sessions.len()
    }

    /// Slots currently holding a connection or a reclaimable identity
    pub fn occupied(&self) -> usize {
        self.sessions.iter().filter(|s| !s.is_free()).count()
    }

    /// Claims a free slot for a new connection
    ///
    /// Returns None if every slot is connected or inside its grace window.
    pub fn allocate(&mut self, connection: Connection) -> Option<SessionId> {
        let id = self.sessions.iter().position(Session::is_free)?;
        let mut session = Session::empty(id);
        session.connection = Some(connection.clone());
        self.sessions[id] = session;
        info!(
            "Connection from {} assigned to slot {} ({}/{} occupied)",
            connection.peer(),
            id,
            self.occupied(),
            self.capacity()
        );
        Some(id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Linear lookup of a logged-in nickname
    pub fn find_by_nick(&self, nick: &str) -> Option<SessionId> {
        self.sessions
            .iter()
            .find(|s| s.nick.as_deref() == Some(nick))
            .map(|s| s.id)
    }

    /// Drops the connection of `id` if it is still `connection_id`
    ///
    /// A reconnect may already have bound a newer connection to the slot; in
    /// that case the slot is left alone and None is returned.
    pub fn detach(&mut self, id: SessionId, connection_id: ConnectionId) -> Option<Connection> {
        let session = self.sessions.get_mut(id)?;
        if session.connection.as_ref().map(Connection::id) != Some(connection_id) {
            return None;
        }
        session.disconnected_at = Some(Instant::now());
        session.connection.take()
    }

    /// Forgets everything about a slot, making it free
    pub fn release(&mut self, id: SessionId) -> Option<Connection> {
        let session = self.sessions.get_mut(id)?;
        if let Some(nick) = &session.nick {
            info!("Slot {} released ({})", id, nick);
        }
        let connection = session.connection.take();
        *session = Session::empty(id);
        connection
    }

    /// Connected sessions that have been silent for longer than `timeout`
    pub fn timed_out(&self, timeout: Duration) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.id)
            .collect()
    }

    /// Dropped identities whose reconnect window has elapsed
    pub fn expired(&self, timeout: Duration) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|s| s.grace_expired(timeout))
            .map(|s| s.id)
            .collect()
    }

    /// Connections of every connected session
    pub fn connections(&self) -> Vec<Connection> {
        self.sessions
            .iter()
            .filter_map(|s| s.connection.clone())
            .collect()
    }

    /// Queues a frame for `id` if it is connected
    pub fn notify(
        &self,
        outbox: &mut Outbox,
        id: SessionId,
        msg_type: MessageType,
        payload: impl Into<String>,
    ) {
        if let Some(session) = self.get(id) {
            session.notify(outbox, msg_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:10000".parse().unwrap()
    }

    fn connection(id: ConnectionId) -> Connection {
        Connection::new(id, test_addr()).0
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            parse_login("alice"),
            Ok(LoginRequest::New {
                nick: "alice".to_string()
            })
        );
        assert_eq!(
            parse_login("alice|abcDEF1234"),
            Ok(LoginRequest::Reconnect {
                nick: "alice".to_string(),
                token: "abcDEF1234".to_string()
            })
        );
        assert_eq!(parse_login(""), Err(LoginError::BadNick));
        assert_eq!(parse_login(&"n".repeat(32)), Err(LoginError::BadNick));
        assert!(parse_login(&"n".repeat(31)).is_ok());
        assert_eq!(parse_login("alice|short"), Err(LoginError::BadToken));
        assert_eq!(parse_login("alice|"), Err(LoginError::BadToken));
        assert_eq!(parse_login("|abcDEF1234"), Err(LoginError::BadNick));
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_allocate_until_full() {
        let mut registry = SessionRegistry::new(2);
        assert_eq!(registry.allocate(connection(1)), Some(0));
        assert_eq!(registry.allocate(connection(2)), Some(1));
        assert_eq!(registry.allocate(connection(3)), None);
        assert_eq!(registry.occupied(), 2);
        assert_eq!(registry.capacity(), 2);

        registry.release(0);
        assert_eq!(registry.allocate(connection(4)), Some(0));
    }

    #[test]
    fn test_slot_reserved_during_grace_window() {
        let mut registry = SessionRegistry::new(1);
        let id = registry.allocate(connection(1)).unwrap();
        registry.get_mut(id).unwrap().nick = Some("alice".to_string());

        assert!(registry.detach(id, 1).is_some());
        assert!(!registry.get(id).unwrap().is_connected());
        assert_eq!(registry.allocate(connection(2)), None);
        assert_eq!(registry.find_by_nick("alice"), Some(id));
    }

    #[test]
    fn test_detach_ignores_stale_connection() {
        let mut registry = SessionRegistry::new(1);
        let id = registry.allocate(connection(1)).unwrap();
        registry.get_mut(id).unwrap().connection = Some(connection(9));

        assert!(registry.detach(id, 1).is_none());
        assert!(registry.get(id).unwrap().is_connected());
    }

    #[test]
    fn test_heartbeat_timeout() {
        let mut registry = SessionRegistry::new(2);
        let id = registry.allocate(connection(1)).unwrap();
        assert!(registry.timed_out(Duration::from_secs(1)).is_empty());

        registry.get_mut(id).unwrap().last_heartbeat = Instant::now() - Duration::from_secs(2);
        assert_eq!(registry.timed_out(Duration::from_secs(1)), vec![id]);

        registry.get_mut(id).unwrap().touch();
        assert!(registry.timed_out(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_grace_expiry() {
        let mut registry = SessionRegistry::new(2);
        let id = registry.allocate(connection(1)).unwrap();
        registry.get_mut(id).unwrap().nick = Some("bob".to_string());
        registry.detach(id, 1);
        assert!(registry.expired(Duration::from_secs(60)).is_empty());

        registry.get_mut(id).unwrap().disconnected_at =
            Some(Instant::now() - Duration::from_secs(61));
        assert_eq!(registry.expired(Duration::from_secs(60)), vec![id]);
    }

    #[test]
    fn test_remember_status_keeps_pre_pause_status() {
        let mut session = Session::empty(0);
        session.status = SessionStatus::OnWait;
        session.remember_status();
        session.status = SessionStatus::Paused;
        session.remember_status();
        assert_eq!(session.last_status, SessionStatus::OnWait);
        assert_eq!(session.last_status.resume_marker(), "WAIT");
    }
}
