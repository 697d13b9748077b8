//! Authoritative state of one match
//!
//! The engine owns the deck, the discard pile, both hands and every
//! combination on the table. Moves arrive as a message type plus payload and
//! are either applied in full or rejected with a [`MoveError`] that leaves the
//! state untouched.
//!
//! Two standard 52-card decks and four jokers make up the 108 cards of a
//! match; the sum of draw pile, discard pile, hands and laid-down cards is
//! always that total. The first seat is the *starter*: it is dealt 15 cards
//! and opens by discarding without drawing.

use crate::combination::{Combination, MIN_COMBINATION_CARDS};
use crate::room_manager::RoomId;
use crate::session::SessionId;
use log::{debug, info};
use rand::seq::SliceRandom;
use shared::{join_codes, Card, CardParseError, MessageType, Suit};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DECK_SIZE: usize = 108;
pub const JOKERS_PER_DECK: usize = 4;
pub const STARTER_HAND: usize = 15;
pub const REGULAR_HAND: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Lobby,
    Starting,
    Playing,
    Paused,
    Finished,
}

/// Where a seat stands within its own turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Turn opened, nothing drawn yet
    AwaitingDraw,
    /// Drew a card, must now discard (or close)
    AwaitingDiscard,
    /// Discarded; the turn has passed on
    TurnComplete,
}

/// One seat at the table
#[derive(Debug, Clone)]
pub struct PlayerGameState {
    pub session: SessionId,
    pub hand: Vec<Card>,
    pub phase: TurnPhase,
    /// False while the seat's player is disconnected
    pub active: bool,
    pub takes_fifteen: bool,
    pub turns_played: u32,
    pub cards_played: u32,
    pub score: u32,
}

impl PlayerGameState {
    fn new(session: SessionId, takes_fifteen: bool) -> Self {
        Self {
            session,
            hand: Vec::new(),
            phase: TurnPhase::AwaitingDraw,
            active: true,
            takes_fifteen,
            turns_played: 0,
            cards_played: 0,
            score: 0,
        }
    }

    /// The starter's opening turn, on which it may not draw
    fn is_opening_turn(&self) -> bool {
        self.takes_fifteen && self.turns_played == 0
    }

    fn hand_index(&self, card: Card) -> Option<usize> {
        self.hand.iter().position(|c| *c == card)
    }
}

/// Reasons a move is refused
///
/// [`MoveError::code`] gives the numeric outcome clients have historically
/// received for each refusal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("The game is not running")]
    NotPlaying,
    #[error("You are not seated in this game")]
    UnknownPlayer,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("You already drew a card")]
    AlreadyDrew,
    #[error("You already discarded")]
    AlreadyDiscarded,
    #[error("You already discarded this turn")]
    DuplicateDiscard,
    #[error("The first player does not draw in the first round")]
    StarterCannotDraw,
    #[error("The first player does not take from the discard pile in the first round")]
    StarterCannotTakeDiscard,
    #[error("Reshuffling the discard pile, try again")]
    DeckRebuilt,
    #[error("No cards left to draw, take from the discard pile")]
    NothingToDraw,
    #[error("The discard pile is empty")]
    DiscardPileEmpty,
    #[error("You must draw first")]
    MustDrawFirst,
    #[error("You cannot discard your last card, close instead")]
    MustClose,
    #[error("Card {0} is not in your hand")]
    CardNotInHand(String),
    #[error("Malformed card list: {0}")]
    BadCards(#[from] CardParseError),
    #[error("Malformed payload")]
    MalformedPayload,
    #[error("A combination needs at least three cards")]
    TooFewCards,
    #[error("Not allowed, you would have nothing left to close with")]
    WouldEmptyHand,
    #[error("Invalid combination")]
    InvalidCombination,
    #[error("No such combination on the table")]
    CombinationNotFound,
    #[error("The card cannot be attached to this combination")]
    CannotAttach,
    #[error("Closing requires exactly one matching card in hand")]
    CannotClose,
    #[error("Unknown action")]
    UnknownAction,
}

impl MoveError {
    pub fn code(&self) -> i32 {
        match self {
            MoveError::AlreadyDrew | MoveError::MustDrawFirst => -2,
            MoveError::AlreadyDiscarded
            | MoveError::StarterCannotTakeDiscard
            | MoveError::DiscardPileEmpty
            | MoveError::NothingToDraw
            | MoveError::MustClose => -3,
            MoveError::StarterCannotDraw => -4,
            MoveError::DeckRebuilt => -5,
            MoveError::UnknownAction => -7,
            MoveError::WouldEmptyHand => -69,
            _ => -1,
        }
    }
}

/// Builds the unshuffled 108-card deck: two decks in suit order, Ace to
/// King within a suit, followed by the jokers
pub fn build_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for _ in 0..2 {
        for suit in Suit::ALL {
            for rank in 1..=13 {
                deck.push(Card::Standard { rank, suit });
            }
        }
    }
    deck.extend(std::iter::repeat(Card::Joker).take(JOKERS_PER_DECK));
    deck
}

/// State of one match, owned by its room
#[derive(Debug, Clone)]
pub struct GameState {
    pub room: RoomId,
    pub status: GameStatus,
    pub players: Vec<PlayerGameState>,
    /// Seat index holding the turn
    pub current: usize,
    /// Top of the pile is the end of the vector
    pub draw_pile: Vec<Card>,
    /// Top of the pile is the end of the vector
    pub discard_pile: Vec<Card>,
    pub combinations: Vec<Combination>,
    pub turn_started: Instant,
    pub pause_reason: Option<String>,
    shuffle: bool,
}

impl GameState {
    /// Seats `members` in order; the first seat becomes the starter
    pub fn new(room: RoomId, members: &[SessionId], shuffle: bool) -> Self {
        let players = members
            .iter()
            .enumerate()
            .map(|(seat, session)| PlayerGameState::new(*session, seat == 0))
            .collect();

        Self {
            room,
            status: GameStatus::Lobby,
            players,
            current: 0,
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
            combinations: Vec::new(),
            turn_started: Instant::now(),
            pause_reason: None,
            shuffle,
        }
    }

    /// Deals the hands, seeds the discard pile and hands the turn to the starter
    pub fn start(&mut self) {
        self.status = GameStatus::Starting;
        self.draw_pile = build_deck();
        if self.shuffle {
            self.draw_pile.shuffle(&mut rand::thread_rng());
        }
        self.discard_pile.clear();
        self.combinations.clear();

        for player in &mut self.players {
            let count = if player.takes_fifteen {
                STARTER_HAND
            } else {
                REGULAR_HAND
            };
            let split = self.draw_pile.len().saturating_sub(count);
            let mut dealt = self.draw_pile.split_off(split);
            dealt.reverse();
            player.hand = dealt;
            player.phase = TurnPhase::AwaitingDraw;
            player.turns_played = 0;
            player.cards_played = 0;
            player.score = 0;
        }

        if let Some(seed) = self.draw_pile.pop() {
            self.discard_pile.push(seed);
        }

        self.current = self
            .players
            .iter()
            .position(|p| p.takes_fifteen)
            .unwrap_or(0);
        self.status = GameStatus::Playing;
        self.turn_started = Instant::now();
        info!(
            "Game in room {} started, {} cards left to draw",
            self.room,
            self.draw_pile.len()
        );
    }

    pub fn seat_of(&self, session: SessionId) -> Option<usize> {
        self.players.iter().position(|p| p.session == session)
    }

    pub fn player(&self, session: SessionId) -> Option<&PlayerGameState> {
        self.players.iter().find(|p| p.session == session)
    }

    /// Session whose turn it is
    pub fn current_session(&self) -> Option<SessionId> {
        self.players.get(self.current).map(|p| p.session)
    }

    pub fn is_turn_of(&self, session: SessionId) -> bool {
        self.current_session() == Some(session)
    }

    pub fn turn_elapsed(&self) -> Duration {
        self.turn_started.elapsed()
    }

    /// Cards in every pile, hand and combination; always [`DECK_SIZE`]
    pub fn total_cards(&self) -> usize {
        self.draw_pile.len()
            + self.discard_pile.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
            + self.combinations.iter().map(|c| c.cards.len()).sum::<usize>()
    }

    /// Applies one action for `session`
    pub fn process_move(
        &mut self,
        session: SessionId,
        action: MessageType,
        payload: &str,
    ) -> Result<(), MoveError> {
        if self.status != GameStatus::Playing {
            return Err(MoveError::NotPlaying);
        }
        let seat = self.seat_of(session).ok_or(MoveError::UnknownPlayer)?;
        if seat != self.current {
            return Err(MoveError::NotYourTurn);
        }

        let result = match action {
            MessageType::TakeFromDeck => self.draw_from_deck(seat),
            MessageType::TakeFromDiscard => self.draw_from_discard(seat),
            MessageType::LayDown => self.lay_down(seat, payload),
            MessageType::AddCard => self.attach(seat, payload),
            MessageType::Discard => self.discard(seat, payload),
            MessageType::Close => self.close(seat, payload),
            _ => Err(MoveError::UnknownAction),
        };

        match &result {
            Ok(()) => debug!("Room {}: seat {} played {}", self.room, seat, action),
            Err(e) => debug!("Room {}: seat {} {} refused: {}", self.room, seat, action, e),
        }
        result
    }

    fn draw_from_deck(&mut self, seat: usize) -> Result<(), MoveError> {
        let player = &self.players[seat];
        match player.phase {
            TurnPhase::AwaitingDiscard => return Err(MoveError::AlreadyDrew),
            TurnPhase::TurnComplete => return Err(MoveError::AlreadyDiscarded),
            TurnPhase::AwaitingDraw => {}
        }
        if player.is_opening_turn() {
            return Err(MoveError::StarterCannotDraw);
        }

        let Some(card) = self.draw_pile.pop() else {
            self.rebuild_draw_pile();
            if self.draw_pile.is_empty() {
                return Err(MoveError::NothingToDraw);
            }
            return Err(MoveError::DeckRebuilt);
        };

        let player = &mut self.players[seat];
        player.hand.push(card);
        player.phase = TurnPhase::AwaitingDiscard;
        Ok(())
    }

    /// Turns the discard pile, minus its top card, into a fresh draw pile
    fn rebuild_draw_pile(&mut self) {
        let Some(top) = self.discard_pile.pop() else {
            return;
        };
        let mut pile: Vec<Card> = self.discard_pile.drain(..).rev().collect();
        if self.shuffle {
            pile.shuffle(&mut rand::thread_rng());
        }
        self.draw_pile = pile;
        self.discard_pile.push(top);
        info!(
            "Room {}: draw pile rebuilt with {} cards",
            self.room,
            self.draw_pile.len()
        );
    }

    fn draw_from_discard(&mut self, seat: usize) -> Result<(), MoveError> {
        let player = &self.players[seat];
        if player.phase == TurnPhase::AwaitingDiscard {
            return Err(MoveError::AlreadyDrew);
        }
        if self.discard_pile.is_empty() {
            return Err(MoveError::DiscardPileEmpty);
        }
        if player.is_opening_turn() {
            return Err(MoveError::StarterCannotTakeDiscard);
        }

        if let Some(card) = self.discard_pile.pop() {
            let player = &mut self.players[seat];
            player.hand.push(card);
            player.phase = TurnPhase::AwaitingDiscard;
        }
        Ok(())
    }

    fn lay_down(&mut self, seat: usize, payload: &str) -> Result<(), MoveError> {
        if payload.len() < MIN_COMBINATION_CARDS * 2 {
            return Err(MoveError::TooFewCards);
        }
        let cards = Card::parse_list(payload)?;

        let player = &self.players[seat];
        if cards.len() >= player.hand.len() {
            return Err(MoveError::WouldEmptyHand);
        }

        let mut used: Vec<usize> = Vec::with_capacity(cards.len());
        for card in &cards {
            let index = player
                .hand
                .iter()
                .enumerate()
                .position(|(i, c)| c == card && !used.contains(&i))
                .ok_or_else(|| MoveError::CardNotInHand(card.code()))?;
            used.push(index);
        }

        let combination =
            Combination::new(player.session, &cards).ok_or(MoveError::InvalidCombination)?;

        let player = &mut self.players[seat];
        used.sort_unstable_by(|a, b| b.cmp(a));
        for index in used {
            player.hand.remove(index);
        }
        player.cards_played += cards.len() as u32;
        self.combinations.push(combination);
        Ok(())
    }

    fn attach(&mut self, seat: usize, payload: &str) -> Result<(), MoveError> {
        let (target, code) = payload.split_once('|').ok_or(MoveError::MalformedPayload)?;
        let card = Card::from_code(code)?;

        let player = &self.players[seat];
        let index = player
            .hand_index(card)
            .ok_or_else(|| MoveError::CardNotInHand(card.code()))?;
        if player.hand.len() <= 1 {
            return Err(MoveError::WouldEmptyHand);
        }

        let combination = self
            .combinations
            .iter_mut()
            .find(|c| c.codes() == target)
            .ok_or(MoveError::CombinationNotFound)?;
        if !combination.try_attach(card) {
            return Err(MoveError::CannotAttach);
        }

        let player = &mut self.players[seat];
        player.hand.remove(index);
        player.cards_played += 1;
        Ok(())
    }

    fn discard(&mut self, seat: usize, payload: &str) -> Result<(), MoveError> {
        let player = &self.players[seat];
        match player.phase {
            TurnPhase::TurnComplete => return Err(MoveError::DuplicateDiscard),
            TurnPhase::AwaitingDraw if !player.is_opening_turn() => {
                return Err(MoveError::MustDrawFirst)
            }
            _ => {}
        }
        if player.hand.len() == 1 {
            return Err(MoveError::MustClose);
        }

        let card = Card::from_code(payload)?;
        let index = player
            .hand_index(card)
            .ok_or_else(|| MoveError::CardNotInHand(card.code()))?;

        let player = &mut self.players[seat];
        let card = player.hand.remove(index);
        player.phase = TurnPhase::TurnComplete;
        player.turns_played += 1;
        let emptied = player.hand.is_empty();
        self.discard_pile.push(card);

        if emptied {
            self.status = GameStatus::Finished;
            info!("Room {}: seat {} emptied their hand", self.room, seat);
        } else {
            self.next_player();
        }
        Ok(())
    }

    fn close(&mut self, seat: usize, payload: &str) -> Result<(), MoveError> {
        let player = &mut self.players[seat];
        if player.hand.len() != 1 || player.hand[0].code() != payload {
            return Err(MoveError::CannotClose);
        }

        let card = player.hand.remove(0);
        player.phase = TurnPhase::TurnComplete;
        self.discard_pile.push(card);
        self.status = GameStatus::Finished;
        info!("Room {}: seat {} closed the game", self.room, seat);
        Ok(())
    }

    /// Hands the turn to the next active seat, or finishes the game when
    /// nobody is left to play
    pub fn next_player(&mut self) {
        let seats = self.players.len();
        let next = (1..=seats)
            .map(|step| (self.current + step) % seats.max(1))
            .find(|&seat| self.players.get(seat).is_some_and(|p| p.active));

        match next {
            Some(seat) => {
                self.current = seat;
                self.players[seat].phase = TurnPhase::AwaitingDraw;
                self.turn_started = Instant::now();
            }
            None => {
                self.current = 0;
                self.status = GameStatus::Finished;
                info!("Room {}: no active seats left, game finished", self.room);
            }
        }
    }

    /// Marks a seat as present or absent
    pub fn set_active(&mut self, session: SessionId, active: bool) {
        if let Some(seat) = self.seat_of(session) {
            self.players[seat].active = active;
        }
    }

    pub fn all_active(&self) -> bool {
        self.players.iter().all(|p| p.active)
    }

    /// Suspends play; returns false unless the game was running
    pub fn pause(&mut self, reason: &str) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        self.status = GameStatus::Paused;
        self.pause_reason = Some(reason.to_string());
        info!("Room {}: game paused ({})", self.room, reason);
        true
    }

    /// Continues a paused game and restarts the turn clock
    pub fn resume(&mut self) -> bool {
        if self.status != GameStatus::Paused {
            return false;
        }
        self.status = GameStatus::Playing;
        self.pause_reason = None;
        self.turn_started = Instant::now();
        info!("Room {}: game resumed", self.room);
        true
    }

    /// Scores each seat by the value of the cards left in its hand
    pub fn calculate_scores(&mut self) {
        for player in &mut self.players {
            player.score = player.hand.iter().map(Card::value).sum();
        }
    }

    /// Codes of a seat's hand separated by `|`
    pub fn hand_codes(&self, session: SessionId) -> Option<String> {
        self.player(session).map(|p| {
            p.hand
                .iter()
                .map(Card::code)
                .collect::<Vec<_>>()
                .join("|")
        })
    }

    /// Snapshot of the table as seen by `session`
    ///
    /// `hand|top-discard|combo,combo,...|TURN-or-WAIT|opponent-card-count`
    pub fn full_state(&self, session: SessionId) -> Option<String> {
        let seat = self.seat_of(session)?;
        let player = &self.players[seat];

        let top = self
            .discard_pile
            .last()
            .map(Card::code)
            .unwrap_or_default();
        let combinations = self
            .combinations
            .iter()
            .map(Combination::codes)
            .collect::<Vec<_>>()
            .join(",");
        let marker = if seat == self.current && self.status == GameStatus::Playing {
            "TURN"
        } else {
            "WAIT"
        };
        let opponent_cards: usize = self
            .players
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != seat)
            .map(|(_, p)| p.hand.len())
            .sum();

        Some(format!(
            "{}|{}|{}|{}|{}",
            join_codes(&player.hand),
            top,
            combinations,
            marker,
            opponent_cards
        ))
    }
}
