//! Card model and the two-character wire codes
//!
//! A card code is a rank character followed by a suit character. Ranks use
//! `A`, `2`..`9`, `X` (ten), `J`, `Q`, `K`; suits use `H`, `D`, `C`, `S`.
//! Jokers are written `YY`.

use std::fmt;
use thiserror::Error;

/// Rank value of a joker when counted against a player's hand
pub const JOKER_VALUE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    /// Suits in deck-building order
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
            Suit::Spades => 'S',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Suit> {
        Suit::ALL.iter().copied().find(|suit| suit.symbol() == symbol)
    }
}

/// A single playing card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Card {
    /// Rank runs from 1 (Ace) through 13 (King)
    Standard { rank: u8, suit: Suit },
    Joker,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardParseError {
    #[error("card code {0:?} is not two characters")]
    BadLength(String),
    #[error("unknown rank in card code {0:?}")]
    UnknownRank(String),
    #[error("unknown suit in card code {0:?}")]
    UnknownSuit(String),
    #[error("card list {0:?} has an odd length")]
    OddLength(String),
}

impl Card {
    /// Builds a standard card, returning None for ranks outside 1..=13
    pub fn new(rank: u8, suit: Suit) -> Option<Card> {
        (1..=13)
            .contains(&rank)
            .then_some(Card::Standard { rank, suit })
    }

    pub fn is_wild(&self) -> bool {
        matches!(self, Card::Joker)
    }

    /// Rank value with Ace low, or None for a joker
    pub fn rank(&self) -> Option<u8> {
        match self {
            Card::Standard { rank, .. } => Some(*rank),
            Card::Joker => None,
        }
    }

    pub fn suit(&self) -> Option<Suit> {
        match self {
            Card::Standard { suit, .. } => Some(*suit),
            Card::Joker => None,
        }
    }

    /// Penalty value of the card when left in hand
    pub fn value(&self) -> u32 {
        match self {
            Card::Standard { rank, .. } => u32::from(*rank),
            Card::Joker => JOKER_VALUE,
        }
    }

    /// Two-character wire code
    pub fn code(&self) -> String {
        self.to_string()
    }

    pub fn from_code(code: &str) -> Result<Card, CardParseError> {
        let mut chars = code.chars();
        let (Some(rank_char), Some(suit_char), None) = (chars.next(), chars.next(), chars.next())
        else {
            return Err(CardParseError::BadLength(code.to_string()));
        };

        if rank_char == 'Y' && suit_char == 'Y' {
            return Ok(Card::Joker);
        }

        let rank = match rank_char {
            'A' => 1,
            '2'..='9' => rank_char as u8 - b'0',
            'X' => 10,
            'J' => 11,
            'Q' => 12,
            'K' => 13,
            _ => return Err(CardParseError::UnknownRank(code.to_string())),
        };
        let suit =
            Suit::from_symbol(suit_char).ok_or_else(|| CardParseError::UnknownSuit(code.to_string()))?;

        Ok(Card::Standard { rank, suit })
    }

    /// Parses a run of concatenated two-character codes such as `AH2H3H`
    pub fn parse_list(codes: &str) -> Result<Vec<Card>, CardParseError> {
        if codes.len() % 2 != 0 || !codes.is_ascii() {
            return Err(CardParseError::OddLength(codes.to_string()));
        }

        codes
            .as_bytes()
            .chunks(2)
            .map(|pair| Card::from_code(&String::from_utf8_lossy(pair)))
            .collect()
    }
}

fn rank_symbol(rank: u8) -> char {
    match rank {
        1 => 'A',
        10 => 'X',
        11 => 'J',
        12 => 'Q',
        13 => 'K',
        n => char::from(b'0' + n),
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Standard { rank, suit } => write!(f, "{}{}", rank_symbol(*rank), suit.symbol()),
            Card::Joker => f.write_str("YY"),
        }
    }
}

/// Concatenates the codes of `cards` with no separator
pub fn join_codes(cards: &[Card]) -> String {
    cards.iter().map(Card::code).collect()
}
