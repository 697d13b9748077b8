//! Periodic heartbeat and reconnect-window enforcement
//!
//! Every tick the sweeper pings every live connection, force-closes peers
//! that stayed silent past the heartbeat timeout, and finally forgets
//! identities whose reconnect window ran out. A forgotten player's room is
//! torn down and its opponent sent back to the lobby.

use crate::connection::Outbox;
use crate::dispatcher::{Context, Dispatcher};
use crate::session::{SessionId, SessionStatus};
use log::{debug, info};
use shared::MessageType;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Runs [`sweep_once`] forever at the configured interval
pub async fn run(dispatcher: Arc<Dispatcher>) {
    let mut ticker = interval(dispatcher.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_once(&dispatcher).await;
    }
}

/// One pass over the session table
pub async fn sweep_once(dispatcher: &Dispatcher) {
    let config = dispatcher.config();
    let mut outbox = Outbox::new();
    {
        let mut guard = dispatcher.registries().lock().await;
        let mut ctx = Context {
            sessions: &mut guard.sessions,
            rooms: &mut guard.rooms,
            outbox: &mut outbox,
            config,
        };

        for connection in ctx.sessions.connections() {
            ctx.outbox.push(&connection, MessageType::Ping, "");
        }

        for id in ctx.sessions.timed_out(config.heartbeat_timeout) {
            ctx.evict(id);
        }

        for id in ctx.sessions.expired(config.reconnect_timeout) {
            ctx.expire(id);
        }
    }
    outbox.deliver();
}

impl Context<'_> {
    /// Closes a silent connection and treats it as dropped
    fn evict(&mut self, id: SessionId) {
        let Some(connection) = self.sessions.get(id).and_then(|s| s.connection.clone()) else {
            return;
        };
        info!("Slot {} ({}) missed its heartbeat", id, connection.peer());

        self.outbox
            .push(&connection, MessageType::Lobby, "Connection lost (heartbeat)");
        self.outbox.close(&connection);
        self.disconnect(id, connection.id());
    }

    /// Forgets a dropped identity and dissolves the room it held a seat in
    fn expire(&mut self, id: SessionId) {
        let room_id = self.sessions.get(id).and_then(|s| s.room);
        info!(
            "Slot {} ({}) did not reconnect in time",
            id,
            self.sessions.get(id).map(|s| s.nick()).unwrap_or("")
        );

        if let Some(room) = room_id.and_then(|r| self.rooms.remove(r)) {
            for other in room.others(id) {
                let Some(session) = self.sessions.get_mut(other) else {
                    continue;
                };
                session.room = None;
                session.last_status = SessionStatus::Connected;
                if session.is_connected() {
                    session.status = SessionStatus::Connected;
                    session.notify(
                        self.outbox,
                        MessageType::Lobby,
                        "Opponent did not reconnect in time",
                    );
                }
                debug!("Slot {} returned to the lobby", other);
            }
        }

        self.sessions.release(id);
    }
}
