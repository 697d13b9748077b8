//! Room table: lobbies of up to two players and the match they play
//!
//! Rooms live in a fixed number of slots and are addressed by slot index.
//! A room owns its [`GameState`] while a match is running; the game is
//! dropped when the match ends or the room is torn down.

use crate::connection::Outbox;
use crate::game::GameState;
use crate::session::{SessionId, SessionRegistry};
use log::info;
use shared::MessageType;
use thiserror::Error;

pub type RoomId = usize;

pub const PLAYERS_PER_ROOM: usize = 2;
pub const ROOM_NAME_MAX_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Ready,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Single-letter form used in room listings
    pub fn symbol(self) -> char {
        match self {
            RoomStatus::Waiting => 'W',
            RoomStatus::Ready => 'R',
            RoomStatus::Playing => 'P',
            RoomStatus::Finished => 'F',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Room is full")]
    Full,
    #[error("Already in this room")]
    AlreadyMember,
    #[error("Not a member of this room")]
    NotMember,
    #[error("Room is not empty")]
    NotEmpty,
    #[error("No free room slot")]
    NoFreeSlot,
    #[error("Room name must be 1 to 15 characters")]
    InvalidName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub session: SessionId,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    pub owner: SessionId,
    /// In join order; the first member takes the starter seat
    pub members: Vec<Member>,
    pub game: Option<GameState>,
}

impl Room {
    fn new(id: RoomId, name: &str, creator: SessionId) -> Self {
        Self {
            id,
            name: name.to_string(),
            status: RoomStatus::Waiting,
            owner: creator,
            members: vec![Member {
                session: creator,
                ready: false,
            }],
            game: None,
        }
    }

    pub fn is_member(&self, session: SessionId) -> bool {
        self.members.iter().any(|m| m.session == session)
    }

    pub fn ready_count(&self) -> usize {
        self.members.iter().filter(|m| m.ready).count()
    }

    /// A full room whose members have all opted in
    pub fn all_ready(&self) -> bool {
        self.members.len() == PLAYERS_PER_ROOM && self.ready_count() == self.members.len()
    }

    pub fn member_ids(&self) -> Vec<SessionId> {
        self.members.iter().map(|m| m.session).collect()
    }

    /// Every member other than `session`
    pub fn others(&self, session: SessionId) -> Vec<SessionId> {
        self.members
            .iter()
            .map(|m| m.session)
            .filter(|s| *s != session)
            .collect()
    }

    pub fn reset_ready(&mut self) {
        for member in &mut self.members {
            member.ready = false;
        }
        self.refresh_status();
    }

    /// Waiting/Ready follow the ready flags; Playing and Finished are set
    /// explicitly by the match lifecycle
    fn refresh_status(&mut self) {
        if matches!(self.status, RoomStatus::Waiting | RoomStatus::Ready) {
            self.status = if self.all_ready() {
                RoomStatus::Ready
            } else {
                RoomStatus::Waiting
            };
        }
    }

    /// Hands a freshly started game to the room
    pub fn begin_match(&mut self, game: GameState) {
        self.game = Some(game);
        self.status = RoomStatus::Playing;
        self.reset_ready();
    }

    /// Drops the game after a match ends; members stay seated for a rematch
    pub fn finish_match(&mut self) {
        self.game = None;
        self.status = RoomStatus::Finished;
        self.reset_ready();
    }

    /// `<id>|<name>|(<count>/<max>)|<status>,`
    pub fn summary(&self) -> String {
        format!(
            "{}|{}|({}/{})|{},\n",
            self.id,
            self.name,
            self.members.len(),
            PLAYERS_PER_ROOM,
            self.status.symbol()
        )
    }

    /// `<nick>|READY|OWNER,` per member
    pub fn info(&self, sessions: &SessionRegistry) -> String {
        self.members
            .iter()
            .map(|m| {
                let nick = sessions.get(m.session).map(|s| s.nick()).unwrap_or("");
                format!(
                    "{}|{}|{},",
                    nick,
                    if m.ready { "READY" } else { "NOT READY" },
                    if m.session == self.owner {
                        "OWNER"
                    } else {
                        "GUEST"
                    }
                )
            })
            .collect()
    }
}

/// Fixed-size table of rooms
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Vec<Option<Room>>,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Opens a room with `creator` as its only member and owner
    pub fn create(&mut self, name: &str, creator: SessionId) -> Result<RoomId, RoomError> {
        if name.is_empty() || name.len() > ROOM_NAME_MAX_LEN {
            return Err(RoomError::InvalidName);
        }
        let id = self
            .rooms
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::NoFreeSlot)?;

        self.rooms[id] = Some(Room::new(id, name, creator));
        info!("Room {} '{}' created by slot {}", id, name, creator);
        Ok(id)
    }

    pub fn join(&mut self, id: RoomId, session: SessionId) -> Result<(), RoomError> {
        let room = self.find_mut(id).ok_or(RoomError::NotFound)?;
        if room.is_member(session) {
            return Err(RoomError::AlreadyMember);
        }
        if matches!(room.status, RoomStatus::Playing | RoomStatus::Finished) {
            return Err(RoomError::AlreadyStarted);
        }
        if room.members.len() >= PLAYERS_PER_ROOM {
            return Err(RoomError::Full);
        }

        room.members.push(Member {
            session,
            ready: false,
        });
        room.refresh_status();
        info!("Slot {} joined room {}", session, id);
        Ok(())
    }

    /// Removes `session` from the room
    ///
    /// Any running game is dropped and the room returns to Waiting. If the
    /// owner left, ownership passes to the remaining member with the lowest
    /// slot, which is returned. The room is freed when its last member leaves.
    pub fn leave(&mut self, id: RoomId, session: SessionId) -> Result<Option<SessionId>, RoomError> {
        let room = self.find_mut(id).ok_or(RoomError::NotFound)?;
        if !room.is_member(session) {
            return Err(RoomError::NotMember);
        }

        room.members.retain(|m| m.session != session);
        info!("Slot {} left room {}", session, id);

        if room.members.is_empty() {
            self.delete(id)?;
            info!("Room {} is empty and was freed", id);
            return Ok(None);
        }

        room.game = None;
        room.status = RoomStatus::Waiting;
        room.refresh_status();

        if room.owner == session {
            let next = room.members.iter().map(|m| m.session).min();
            if let Some(owner) = next {
                room.owner = owner;
                info!("Slot {} now owns room {}", owner, id);
            }
            return Ok(next);
        }
        Ok(None)
    }

    /// Sets the ready flag and returns the number of ready members
    pub fn set_ready(&mut self, id: RoomId, session: SessionId, ready: bool) -> Result<usize, RoomError> {
        let room = self.find_mut(id).ok_or(RoomError::NotFound)?;
        let member = room
            .members
            .iter_mut()
            .find(|m| m.session == session)
            .ok_or(RoomError::NotMember)?;
        member.ready = ready;
        room.refresh_status();
        Ok(room.ready_count())
    }

    pub fn find(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id).and_then(Option::as_ref)
    }

    pub fn find_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id).and_then(Option::as_mut)
    }

    pub fn find_by_session(&self, session: SessionId) -> Option<RoomId> {
        self.rooms
            .iter()
            .flatten()
            .find(|room| room.is_member(session))
            .map(|room| room.id)
    }

    /// Listing of every open room, or None when there are none
    pub fn list(&self) -> Option<String> {
        let listing: String = self.rooms.iter().flatten().map(Room::summary).collect();
        (!listing.is_empty()).then_some(listing)
    }

    /// Frees an empty room slot
    pub fn delete(&mut self, id: RoomId) -> Result<(), RoomError> {
        let room = self.find(id).ok_or(RoomError::NotFound)?;
        if !room.members.is_empty() {
            return Err(RoomError::NotEmpty);
        }
        self.rooms[id] = None;
        Ok(())
    }

    /// Removes a room regardless of its members, returning it
    pub fn remove(&mut self, id: RoomId) -> Option<Room> {
        let room = self.rooms.get_mut(id)?.take();
        if room.is_some() {
            info!("Room {} torn down", id);
        }
        room
    }

    /// Queues a frame for every connected member except `except`
    pub fn broadcast(
        &self,
        id: RoomId,
        sessions: &SessionRegistry,
        outbox: &mut Outbox,
        msg_type: MessageType,
        payload: &str,
        except: Option<SessionId>,
    ) {
        if let Some(room) = self.find(id) {
            for member in &room.members {
                if Some(member.session) != except {
                    sessions.notify(outbox, member.session, msg_type, payload);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let mut rooms = RoomRegistry::new(2);
        assert_eq!(rooms.list(), None);

        let id = rooms.create("table1", 0).unwrap();
        assert_eq!(id, 0);
        assert_eq!(rooms.list().unwrap(), "0|table1|(1/2)|W,\n");

        assert_eq!(rooms.create("table2", 1), Ok(1));
        assert_eq!(rooms.create("table3", 2), Err(RoomError::NoFreeSlot));
        assert_eq!(rooms.create("", 2), Err(RoomError::InvalidName));
        assert_eq!(rooms.create(&"x".repeat(16), 2), Err(RoomError::InvalidName));
    }

    #[test]
    fn test_join_errors() {
        let mut rooms = RoomRegistry::new(2);
        let id = rooms.create("table1", 0).unwrap();

        assert_eq!(rooms.join(5, 1), Err(RoomError::NotFound));
        assert_eq!(rooms.join(id, 0), Err(RoomError::AlreadyMember));
        assert_eq!(rooms.join(id, 1), Ok(()));
        assert_eq!(rooms.join(id, 2), Err(RoomError::Full));

        rooms.find_mut(id).unwrap().status = RoomStatus::Playing;
        assert_eq!(rooms.join(id, 2), Err(RoomError::AlreadyStarted));
    }

    #[test]
    fn test_ready_tracking() {
        let mut rooms = RoomRegistry::new(1);
        let id = rooms.create("table1", 0).unwrap();
        assert_eq!(rooms.set_ready(id, 0, true), Ok(1));
        assert!(!rooms.find(id).unwrap().all_ready());

        rooms.join(id, 1).unwrap();
        assert_eq!(rooms.set_ready(id, 1, true), Ok(2));
        assert_eq!(rooms.find(id).unwrap().status, RoomStatus::Ready);

        assert_eq!(rooms.set_ready(id, 1, false), Ok(1));
        assert_eq!(rooms.find(id).unwrap().status, RoomStatus::Waiting);
        assert_eq!(rooms.set_ready(id, 4, true), Err(RoomError::NotMember));
    }

    #[test]
    fn test_owner_reassigned_on_leave() {
        let mut rooms = RoomRegistry::new(1);
        let id = rooms.create("table1", 3).unwrap();
        rooms.join(id, 1).unwrap();

        assert_eq!(rooms.leave(id, 3), Ok(Some(1)));
        assert_eq!(rooms.find(id).unwrap().owner, 1);
        assert_eq!(rooms.leave(id, 3), Err(RoomError::NotMember));

        assert_eq!(rooms.leave(id, 1), Ok(None));
        assert!(rooms.find(id).is_none());
        assert_eq!(rooms.delete(id), Err(RoomError::NotFound));
        assert_eq!(rooms.find_by_session(1), None);

        // The freed slot is handed out again
        assert_eq!(rooms.create("table2", 1), Ok(id));
    }

    #[test]
    fn test_guest_leave_keeps_owner() {
        let mut rooms = RoomRegistry::new(1);
        let id = rooms.create("table1", 0).unwrap();
        rooms.join(id, 1).unwrap();
        assert_eq!(rooms.leave(id, 1), Ok(None));
        assert_eq!(rooms.find(id).unwrap().owner, 0);
        assert_eq!(rooms.find_by_session(0), Some(id));
        assert_eq!(rooms.find_by_session(1), None);
    }

    #[test]
    fn test_delete_requires_empty_room() {
        let mut rooms = RoomRegistry::new(1);
        let id = rooms.create("table1", 0).unwrap();
        assert_eq!(rooms.delete(id), Err(RoomError::NotEmpty));

        rooms.find_mut(id).unwrap().members.clear();
        assert_eq!(rooms.delete(id), Ok(()));
        assert_eq!(rooms.delete(id), Err(RoomError::NotFound));
    }

    #[test]
    fn test_match_lifecycle_status() {
        let mut rooms = RoomRegistry::new(1);
        let id = rooms.create("table1", 0).unwrap();
        rooms.join(id, 1).unwrap();
        rooms.set_ready(id, 0, true).unwrap();
        rooms.set_ready(id, 1, true).unwrap();

        let room = rooms.find_mut(id).unwrap();
        let mut game = GameState::new(id, &room.member_ids(), false);
        game.start();
        room.begin_match(game);
        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.ready_count(), 0);
        assert!(room.game.is_some());

        room.finish_match();
        assert_eq!(room.status, RoomStatus::Finished);
        assert!(room.game.is_none());
        assert_eq!(rooms.join(id, 2), Err(RoomError::AlreadyStarted));
    }
}
