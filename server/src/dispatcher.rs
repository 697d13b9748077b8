//! Per-session state machine
//!
//! Each inbound frame is handled under the registry locks by walking the
//! transition table for the sender's current status:
//!
//! | Status         | Accepted                                              |
//! |----------------|-------------------------------------------------------|
//! | `Disconnected` | `LOGI`, `QUIT`                                        |
//! | `Connected`    | `RLIS`, `RCRT`, `RCNT`, `QUIT`                        |
//! | `InRoom`       | `RDIS`, `REDY`, `STRT`, `QUIT`                        |
//! | `OnTurn`       | `TAKP`, `TAKT`, `UNLO`, `ADDC`, `THRW`, `CLOS`, `QUIT` |
//! | `OnWait`       | `QUIT` (anything else is "not your turn")             |
//! | `Paused`       | `QUIT` (anything else gets a notice)                  |
//! | `GameDone`     | `PLAG`, `LBBY`, `CNNT`, `QUIT`                        |
//!
//! `PING` and `PONG` are accepted in every status and only refresh the
//! heartbeat. Replies and broadcasts are collected in an [`Outbox`] and
//! delivered after both locks are released.
//!
//! A dropped connection keeps its identity for the reconnect grace window.
//! If it was in a running match the game is paused and the opponent told;
//! otherwise the player leaves its room right away.

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionId, Outbox};
use crate::game::{GameState, GameStatus};
use crate::registry::Registries;
use crate::room_manager::{RoomId, RoomRegistry, PLAYERS_PER_ROOM};
use crate::session::{
    generate_token, parse_login, LoginRequest, SessionId, SessionRegistry, SessionStatus,
};
use log::{debug, info, warn};
use shared::{Frame, MessageType};
use std::sync::Arc;

/// What the connection worker does after a frame has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect,
}

/// Entry point for connection workers
#[derive(Debug)]
pub struct Dispatcher {
    registries: Arc<Registries>,
    config: Arc<ServerConfig>,
}

impl Dispatcher {
    pub fn new(registries: Arc<Registries>, config: Arc<ServerConfig>) -> Self {
        Self { registries, config }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Claims a session slot for a new connection, or turns it away when the
    /// table is full
    pub async fn accept(&self, connection: &Connection) -> Option<SessionId> {
        let slot = {
            let mut guard = self.registries.lock().await;
            guard.sessions.allocate(connection.clone())
        };

        if slot.is_none() {
            warn!("Rejecting {}: no free session slot", connection.peer());
            let mut outbox = Outbox::new();
            outbox.push(
                connection,
                MessageType::Error,
                "Cannot connect at the moment (FULL)",
            );
            outbox.close(connection);
            outbox.deliver();
        }
        slot
    }

    /// Runs one frame through the state machine
    ///
    /// `slot` may be rebound when a reconnect moves the connection onto the
    /// session that holds the player's history.
    pub async fn handle_frame(
        &self,
        slot: &mut SessionId,
        connection: &Connection,
        frame: Frame,
    ) -> Flow {
        let mut outbox = Outbox::new();
        let flow = {
            let mut guard = self.registries.lock().await;
            let mut ctx = Context {
                sessions: &mut guard.sessions,
                rooms: &mut guard.rooms,
                outbox: &mut outbox,
                config: &self.config,
            };
            ctx.dispatch(slot, connection, frame)
        };
        outbox.deliver();
        flow
    }

    /// Cleans up after a connection's reader has stopped
    pub async fn handle_disconnect(&self, slot: SessionId, connection: &Connection) {
        let mut outbox = Outbox::new();
        {
            let mut guard = self.registries.lock().await;
            let mut ctx = Context {
                sessions: &mut guard.sessions,
                rooms: &mut guard.rooms,
                outbox: &mut outbox,
                config: &self.config,
            };
            ctx.disconnect(slot, connection.id());
        }
        outbox.deliver();
    }
}

/// Both tables plus the outbox, borrowed for the duration of one transition
pub(crate) struct Context<'a> {
    pub(crate) sessions: &'a mut SessionRegistry,
    pub(crate) rooms: &'a mut RoomRegistry,
    pub(crate) outbox: &'a mut Outbox,
    pub(crate) config: &'a ServerConfig,
}

impl Context<'_> {
    fn reply(&mut self, id: SessionId, msg_type: MessageType, payload: impl Into<String>) {
        self.sessions.notify(self.outbox, id, msg_type, payload);
    }

    fn broadcast(
        &mut self,
        room: RoomId,
        msg_type: MessageType,
        payload: &str,
        except: Option<SessionId>,
    ) {
        self.rooms
            .broadcast(room, self.sessions, self.outbox, msg_type, payload, except);
    }

    /// Room `id` sits in, taken from its session or else from the membership
    /// lists, in which case the session record is repaired
    fn room_of(&mut self, id: SessionId) -> Option<RoomId> {
        let session = self.sessions.get_mut(id)?;
        if session.room.is_none() {
            session.room = self.rooms.find_by_session(id);
            if let Some(room) = session.room {
                debug!("Slot {} found in room {} by membership", id, room);
            }
        }
        session.room
    }

    fn set_status(&mut self, id: SessionId, status: SessionStatus) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.status = status;
        }
    }

    fn dispatch(&mut self, slot: &mut SessionId, connection: &Connection, frame: Frame) -> Flow {
        let Some(session) = self.sessions.get_mut(*slot) else {
            return Flow::Disconnect;
        };
        if session.connection.as_ref().map(Connection::id) != Some(connection.id()) {
            debug!("Frame from stale connection {} ignored", connection.peer());
            return Flow::Disconnect;
        }
        session.touch();

        if matches!(frame.msg_type, MessageType::Ping | MessageType::Pong) {
            return Flow::Continue;
        }

        let id = *slot;
        let status = session.status;
        match status {
            SessionStatus::Disconnected => self.on_login(slot, connection, frame),
            SessionStatus::Connected => self.on_lobby(id, frame),
            SessionStatus::InRoom => self.on_room(id, frame),
            SessionStatus::OnTurn => self.on_turn(id, frame),
            SessionStatus::OnWait => self.on_wait(id, frame),
            SessionStatus::Paused => self.on_paused(id, frame),
            SessionStatus::GameDone => self.on_game_done(id, frame),
        }
    }

    // ---- Disconnected ----

    fn on_login(&mut self, slot: &mut SessionId, connection: &Connection, frame: Frame) -> Flow {
        match frame.msg_type {
            MessageType::Login => self.login(slot, connection, &frame.payload),
            MessageType::Quit => {
                self.sessions.release(*slot);
                Flow::Disconnect
            }
            other => {
                warn!("{} sent {} before logging in", connection.peer(), other);
                Flow::Disconnect
            }
        }
    }

    fn login(&mut self, slot: &mut SessionId, connection: &Connection, payload: &str) -> Flow {
        let request = match parse_login(payload) {
            Ok(request) => request,
            Err(e) => {
                self.reply(*slot, MessageType::Error, e.to_string());
                return Flow::Continue;
            }
        };

        match request {
            LoginRequest::New { nick } => {
                if self.sessions.find_by_nick(&nick).is_some() {
                    info!("Login as '{}' refused: name in use", nick);
                    self.reply(*slot, MessageType::Error, "User already exists");
                    return Flow::Disconnect;
                }

                let token = generate_token();
                if let Some(session) = self.sessions.get_mut(*slot) {
                    session.nick = Some(nick.clone());
                    session.token = Some(token.clone());
                    session.status = SessionStatus::Connected;
                    session.last_status = SessionStatus::Connected;
                    session.invalid_messages = 0;
                }
                info!("'{}' logged in on slot {}", nick, slot);
                self.reply(*slot, MessageType::Okay, format!("Welcome!|{}", token));
                Flow::Continue
            }
            LoginRequest::Reconnect { nick, token } => {
                self.reconnect(slot, connection, &nick, &token)
            }
        }
    }

    fn reconnect(
        &mut self,
        slot: &mut SessionId,
        connection: &Connection,
        nick: &str,
        token: &str,
    ) -> Flow {
        let Some(existing) = self.sessions.find_by_nick(nick) else {
            self.reply(*slot, MessageType::Error, "Session expired");
            return Flow::Continue;
        };
        let Some(target) = self.sessions.get(existing) else {
            return Flow::Disconnect;
        };
        if target.is_connected() {
            info!("Reconnect as '{}' refused: still connected", nick);
            self.reply(*slot, MessageType::Error, "User already exists");
            return Flow::Disconnect;
        }
        if target.token.as_deref() != Some(token) {
            info!("Reconnect as '{}' refused: bad token", nick);
            self.reply(*slot, MessageType::Error, "Invalid token");
            return Flow::Continue;
        }

        if existing != *slot {
            debug!("Moving {} from slot {} to slot {}", connection.peer(), slot, existing);
            self.sessions.release(*slot);
            *slot = existing;
        }

        let Some(session) = self.sessions.get_mut(existing) else {
            return Flow::Disconnect;
        };
        session.connection = Some(connection.clone());
        session.disconnected_at = None;
        session.touch();
        session.status = session.last_status;
        info!("'{}' reconnected on slot {}", nick, existing);

        self.reply(existing, MessageType::Reconnected, "Reconnected");
        self.restore_after_reconnect(existing);
        Flow::Continue
    }

    /// Reseats a reconnected player and resumes its game once everyone is back
    fn restore_after_reconnect(&mut self, id: SessionId) {
        let room_id = self.sessions.get(id).and_then(|s| s.room);
        let game = room_id.and_then(|r| {
            self.rooms
                .find_mut(r)
                .and_then(|room| room.game.as_mut())
                .map(|game| (r, game))
        });

        let Some((room_id, game)) = game else {
            // Nothing to rejoin: back to the lobby
            if let Some(session) = self.sessions.get_mut(id) {
                if session.status.in_game() || room_id.is_none() {
                    session.room = None;
                    session.status = SessionStatus::Connected;
                }
                session.last_status = session.status;
                let marker = session.status.resume_marker();
                self.reply(id, MessageType::Okay, marker);
            }
            return;
        };

        game.set_active(id, true);
        let resumed = game.all_active() && game.resume();
        let still_paused = game.status == GameStatus::Paused;
        let state = game.full_state(id);
        let seats: Vec<SessionId> = game.players.iter().map(|p| p.session).collect();

        if resumed {
            for seat in &seats {
                if let Some(session) = self.sessions.get_mut(*seat) {
                    if session.status == SessionStatus::Paused {
                        session.status = session.last_status;
                    }
                }
            }
        } else if still_paused {
            self.set_status(id, SessionStatus::Paused);
        }

        let marker = self
            .sessions
            .get(id)
            .map(|s| s.status.resume_marker())
            .unwrap_or("LOBBY");
        self.reply(id, MessageType::Okay, marker);
        if let Some(state) = state {
            self.reply(id, MessageType::State, state);
        }
        if resumed {
            self.broadcast(
                room_id,
                MessageType::Resumed,
                "Player reconnected, game resumed",
                None,
            );
        }
    }

    // ---- Connected ----

    fn on_lobby(&mut self, id: SessionId, frame: Frame) -> Flow {
        match frame.msg_type {
            MessageType::RoomList => {
                match self.rooms.list() {
                    Some(listing) => self.reply(id, MessageType::RoomList, listing),
                    None => self.reply(id, MessageType::RoomListEmpty, "No rooms"),
                }
                Flow::Continue
            }
            MessageType::RoomCreate => {
                match self.rooms.create(frame.payload.trim(), id) {
                    Ok(room) => {
                        if let Some(session) = self.sessions.get_mut(id) {
                            session.room = Some(room);
                            session.status = SessionStatus::InRoom;
                        }
                        self.reply(id, MessageType::RoomCreated, room.to_string());
                        self.reply(id, MessageType::Owner, "1");
                        self.send_room_info(room);
                    }
                    Err(e) => self.reply(id, MessageType::RoomCreateFailed, e.to_string()),
                }
                Flow::Continue
            }
            MessageType::RoomJoin => {
                let joined = frame
                    .payload
                    .trim()
                    .parse::<RoomId>()
                    .map_err(|_| "Invalid room id".to_string())
                    .and_then(|room| {
                        self.rooms
                            .join(room, id)
                            .map(|_| room)
                            .map_err(|e| e.to_string())
                    });
                match joined {
                    Ok(room) => {
                        if let Some(session) = self.sessions.get_mut(id) {
                            session.room = Some(room);
                            session.status = SessionStatus::InRoom;
                        }
                        self.reply(id, MessageType::RoomJoined, room.to_string());
                        self.send_room_info(room);
                    }
                    Err(reason) => self.reply(id, MessageType::RoomJoinFailed, reason),
                }
                Flow::Continue
            }
            MessageType::Quit => {
                self.sessions.release(id);
                Flow::Disconnect
            }
            other => {
                if let Some(session) = self.sessions.get_mut(id) {
                    session.invalid_messages += 1;
                    warn!(
                        "'{}' sent {} in the lobby ({} invalid)",
                        session.nick(),
                        other,
                        session.invalid_messages
                    );
                }
                Flow::Disconnect
            }
        }
    }

    fn send_room_info(&mut self, room: RoomId) {
        if let Some(info) = self.rooms.find(room).map(|r| r.info(self.sessions)) {
            self.broadcast(room, MessageType::RoomInfo, &info, None);
        }
    }

    // ---- InRoom ----

    fn on_room(&mut self, id: SessionId, frame: Frame) -> Flow {
        let Some(room_id) = self.room_of(id) else {
            self.set_status(id, SessionStatus::Connected);
            self.reply(id, MessageType::Error, "Not in a room");
            return Flow::Continue;
        };

        match frame.msg_type {
            MessageType::RoomLeave => {
                self.leave_room(id);
                self.set_status(id, SessionStatus::Connected);
                self.reply(id, MessageType::RoomLeft, "Left the room");
                Flow::Continue
            }
            MessageType::Ready => {
                let ready = frame.payload.trim() == "1";
                match self.rooms.set_ready(room_id, id, ready) {
                    Ok(count) => {
                        let progress = format!("({}/{})", count, PLAYERS_PER_ROOM);
                        self.broadcast(room_id, MessageType::PlayersReady, &progress, None);
                        self.send_room_info(room_id);
                    }
                    Err(e) => self.reply(id, MessageType::Error, e.to_string()),
                }
                Flow::Continue
            }
            MessageType::Start => {
                let Some(room) = self.rooms.find(room_id) else {
                    self.reply(id, MessageType::StartFailed, "Room not found");
                    return Flow::Continue;
                };
                if room.owner != id {
                    self.reply(id, MessageType::StartFailed, "Only the owner can start");
                } else if !room.all_ready() {
                    self.reply(id, MessageType::StartFailed, "Not all players are ready");
                } else {
                    self.start_match(room_id);
                }
                Flow::Continue
            }
            MessageType::Quit => {
                self.leave_room(id);
                self.sessions.release(id);
                Flow::Disconnect
            }
            other => {
                warn!("Slot {} sent {} while in a room", id, other);
                Flow::Disconnect
            }
        }
    }

    /// Creates, deals and announces a match for every member of `room_id`
    fn start_match(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.find_mut(room_id) else {
            return;
        };

        let mut game = GameState::new(room_id, &room.member_ids(), self.config.shuffle_deck);
        game.start();
        let starter = game.current_session();
        let hands: Vec<(SessionId, String)> = game
            .players
            .iter()
            .filter_map(|p| game.hand_codes(p.session).map(|codes| (p.session, codes)))
            .collect();
        room.begin_match(game);
        info!("Match started in room {}", room_id);

        self.broadcast(room_id, MessageType::Start, "Game started", None);
        for (member, codes) in hands {
            let (status, msg_type, text) = if Some(member) == starter {
                (SessionStatus::OnTurn, MessageType::Turn, "Your turn")
            } else {
                (SessionStatus::OnWait, MessageType::Wait, "Wait for your opponent")
            };
            if let Some(session) = self.sessions.get_mut(member) {
                session.status = status;
                session.last_status = status;
            }
            self.reply(member, msg_type, text);
            self.reply(member, MessageType::Cards, codes);
        }
    }

    /// Takes `id` out of its room and tells whoever is left
    fn leave_room(&mut self, id: SessionId) {
        let Some(room_id) = self.sessions.get_mut(id).and_then(|s| s.room.take()) else {
            return;
        };

        match self.rooms.leave(room_id, id) {
            Ok(new_owner) => {
                if let Some(owner) = new_owner {
                    self.reply(owner, MessageType::Owner, "1");
                }
                let remaining = self
                    .rooms
                    .find(room_id)
                    .map(|room| room.member_ids())
                    .unwrap_or_default();
                for member in remaining {
                    if let Some(session) = self.sessions.get_mut(member) {
                        if session.is_connected() && session.status != SessionStatus::InRoom {
                            session.status = SessionStatus::InRoom;
                            session.last_status = SessionStatus::InRoom;
                        }
                    }
                }
                self.send_room_info(room_id);
            }
            Err(e) => warn!("Slot {} could not leave room {}: {}", id, room_id, e),
        }
    }

    // ---- OnTurn / OnWait / Paused ----

    fn on_turn(&mut self, id: SessionId, frame: Frame) -> Flow {
        match frame.msg_type {
            action if action.is_move() => {
                self.play_move(id, action, &frame.payload);
                Flow::Continue
            }
            MessageType::Quit => Flow::Disconnect,
            other => {
                warn!("Slot {} sent {} on its turn", id, other);
                Flow::Disconnect
            }
        }
    }

    fn on_wait(&mut self, id: SessionId, frame: Frame) -> Flow {
        match frame.msg_type {
            MessageType::Quit => Flow::Disconnect,
            _ => {
                self.reply(id, MessageType::Error, "Not your turn");
                Flow::Continue
            }
        }
    }

    fn on_paused(&mut self, id: SessionId, frame: Frame) -> Flow {
        match frame.msg_type {
            MessageType::Quit => Flow::Disconnect,
            _ => {
                self.reply(id, MessageType::Notice, "Game paused");
                Flow::Continue
            }
        }
    }

    fn play_move(&mut self, id: SessionId, action: MessageType, payload: &str) {
        let room_id = self.room_of(id);
        let Some((room_id, game)) = room_id.and_then(|r| {
            self.rooms
                .find_mut(r)
                .and_then(|room| room.game.as_mut())
                .map(|game| (r, game))
        }) else {
            self.reply(id, MessageType::Error, "No game in progress");
            return;
        };

        if let Err(e) = game.process_move(id, action, payload) {
            let reason = e.to_string();
            self.reply(id, MessageType::Error, reason);
            return;
        }

        if game.status == GameStatus::Finished {
            self.finish_match(room_id, id);
            return;
        }

        let current = game.current_session();
        let states: Vec<(SessionId, Option<String>)> = game
            .players
            .iter()
            .map(|p| (p.session, game.full_state(p.session)))
            .collect();

        for (member, state) in &states {
            if let Some(state) = state {
                self.reply(*member, MessageType::State, state.clone());
            }
        }

        match action {
            MessageType::AddCard => self.reply(id, MessageType::Okay, "Card attached"),
            MessageType::Discard => {
                for (member, _) in states {
                    let (status, msg_type, text) = if Some(member) == current {
                        (SessionStatus::OnTurn, MessageType::Turn, "Your turn")
                    } else {
                        (SessionStatus::OnWait, MessageType::Wait, "Wait for your opponent")
                    };
                    self.set_status(member, status);
                    self.reply(member, msg_type, text);
                }
            }
            _ => {}
        }
    }

    /// Scores the finished match, reports it and parks the room for a rematch
    fn finish_match(&mut self, room_id: RoomId, winner: SessionId) {
        let Some(room) = self.rooms.find_mut(room_id) else {
            return;
        };
        let Some(game) = room.game.as_mut() else {
            return;
        };
        game.calculate_scores();

        let nick_of = |session: SessionId| {
            self.sessions
                .get(session)
                .map(|s| s.nick().to_string())
                .unwrap_or_default()
        };
        let mut report = format!("W:{}", nick_of(winner));
        for player in &game.players {
            report.push_str(&format!(
                "|P:{}:{}:{}:{}",
                nick_of(player.session),
                player.score,
                player.cards_played,
                player.turns_played
            ));
        }
        let members = room.member_ids();
        room.finish_match();
        info!("Match in room {} finished: {}", room_id, report);

        self.broadcast(room_id, MessageType::GameEnd, &report, None);
        for member in members {
            if let Some(session) = self.sessions.get_mut(member) {
                session.status = SessionStatus::GameDone;
                session.last_status = SessionStatus::GameDone;
            }
        }
    }

    // ---- GameDone ----

    fn on_game_done(&mut self, id: SessionId, frame: Frame) -> Flow {
        let Some(room_id) = self.room_of(id) else {
            self.set_status(id, SessionStatus::Connected);
            self.reply(id, MessageType::Lobby, "Back to lobby");
            return Flow::Continue;
        };

        match frame.msg_type {
            MessageType::PlayAgain => {
                let wants_rematch = frame.payload.trim() == "1";
                match self.rooms.set_ready(room_id, id, wants_rematch) {
                    Ok(count) => {
                        let all_ready = self.rooms.find(room_id).is_some_and(|r| r.all_ready());
                        if all_ready {
                            self.start_match(room_id);
                        } else {
                            let progress = format!("({}/{})", count, PLAYERS_PER_ROOM);
                            self.broadcast(room_id, MessageType::PlayersReady, &progress, None);
                            if wants_rematch {
                                self.reply(id, MessageType::StartFailed, "Waiting for the opponent");
                            }
                        }
                    }
                    Err(e) => self.reply(id, MessageType::StartFailed, e.to_string()),
                }
                Flow::Continue
            }
            MessageType::Lobby => {
                self.broadcast(room_id, MessageType::Lobby, "Back to lobby", None);
                self.return_to_lobby(room_id);
                Flow::Continue
            }
            MessageType::LeaveToLobby => {
                self.leave_room(id);
                self.set_status(id, SessionStatus::Connected);
                self.reply(id, MessageType::Lobby, "Back to lobby");
                Flow::Continue
            }
            MessageType::Quit => {
                self.leave_room(id);
                self.sessions.release(id);
                Flow::Disconnect
            }
            _ => {
                self.reply(id, MessageType::Notice, "Game over");
                Flow::Continue
            }
        }
    }

    /// Tears down a room and sends every member back to the lobby
    pub(crate) fn return_to_lobby(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.remove(room_id) else {
            return;
        };
        for member in room.member_ids() {
            if let Some(session) = self.sessions.get_mut(member) {
                session.room = None;
                session.last_status = SessionStatus::Connected;
                if session.is_connected() {
                    session.status = SessionStatus::Connected;
                }
            }
        }
    }

    // ---- Disconnects ----

    /// Applies the drop policy after connection `connection_id` of `id` ended
    pub(crate) fn disconnect(&mut self, id: SessionId, connection_id: ConnectionId) {
        let Some(session) = self.sessions.get(id) else {
            return;
        };
        if session.connection.as_ref().map(Connection::id) != Some(connection_id) {
            return;
        }
        if !session.is_logged_in() {
            self.sessions.release(id);
            return;
        }

        self.sessions.detach(id, connection_id);
        if let Some(session) = self.sessions.get_mut(id) {
            session.remember_status();
            session.status = SessionStatus::Disconnected;
            info!("'{}' disconnected, holding slot {} for reconnect", session.nick(), id);
        }
        self.after_drop(id);
    }

    /// Pauses the running match of a dropped player, or takes the player out
    /// of its room when no match is running
    pub(crate) fn after_drop(&mut self, id: SessionId) {
        let Some(room_id) = self.sessions.get(id).and_then(|s| s.room) else {
            return;
        };

        let game = self
            .rooms
            .find_mut(room_id)
            .and_then(|room| room.game.as_mut())
            .filter(|game| matches!(game.status, GameStatus::Playing | GameStatus::Paused));

        match game {
            Some(game) => {
                game.set_active(id, false);
                if game.pause("Opponent disconnected, waiting for reconnect") {
                    debug!(
                        "Room {}: paused {:?} into the turn",
                        room_id,
                        game.turn_elapsed()
                    );
                }
                let reason = game.pause_reason.clone().unwrap_or_default();
                let others: Vec<SessionId> = game
                    .players
                    .iter()
                    .map(|p| p.session)
                    .filter(|s| *s != id)
                    .collect();

                for other in others {
                    if let Some(session) = self.sessions.get_mut(other) {
                        if session.is_connected() {
                            session.remember_status();
                            session.status = SessionStatus::Paused;
                        }
                    }
                }
                self.broadcast(room_id, MessageType::Paused, &reason, Some(id));
            }
            None => {
                self.leave_room(id);
                if let Some(session) = self.sessions.get_mut(id) {
                    session.last_status = SessionStatus::Connected;
                }
                self.broadcast(room_id, MessageType::Notice, "Player disconnected", Some(id));
            }
        }
    }
}
