//! Shared server state and its locking discipline
//!
//! The session table and the room table each sit behind their own mutex.
//! [`Registries::lock`] is the only way to reach them and always takes the
//! session lock before the room lock, so connection workers and the sweeper
//! can never deadlock on each other.

use crate::config::ServerConfig;
use crate::room_manager::RoomRegistry;
use crate::session::SessionRegistry;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct Registries {
    sessions: Mutex<SessionRegistry>,
    rooms: Mutex<RoomRegistry>,
}

/// Both tables, locked in order
pub struct RegistryGuard<'a> {
    pub sessions: MutexGuard<'a, SessionRegistry>,
    pub rooms: MutexGuard<'a, RoomRegistry>,
}

impl Registries {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::new(config.max_sessions)),
            rooms: Mutex::new(RoomRegistry::new(config.max_rooms)),
        }
    }

    pub async fn lock(&self) -> RegistryGuard<'_> {
        let sessions = self.sessions.lock().await;
        let rooms = self.rooms.lock().await;
        RegistryGuard { sessions, rooms }
    }
}
