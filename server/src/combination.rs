//! Legality of laid-down card combinations
//!
//! A combination is either a *set* (one rank, each suit at most once, at
//! most four cards) or a *run* (one suit, consecutive ranks). Jokers stand in
//! for any missing suit in a set or any missing rank in a run.
//!
//! Runs are stored in rank order with jokers placed in the gaps they fill.
//! Each run position is numbered 1 (Ace low) through 14 (Ace high), so the
//! bounds of a run follow from its lowest position and its length.

use crate::session::SessionId;
use shared::{Card, Suit};

/// Fewest cards a new combination may contain
pub const MIN_COMBINATION_CARDS: usize = 3;
/// A set can hold each of the four suits once
pub const MAX_SET_CARDS: usize = 4;
/// Hard cap on any combination, attachments included
pub const MAX_COMBINATION_CARDS: usize = 15;

const LOW_ACE: u8 = 1;
const HIGH_ACE: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationKind {
    /// Same rank, distinct suits
    Set { rank: u8 },
    /// Same suit, consecutive positions starting at `low`
    Run { low: u8 },
}

/// A group of cards laid on the table by one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub kind: CombinationKind,
    pub cards: Vec<Card>,
    pub owner: SessionId,
}

impl Combination {
    /// Validates `cards` and builds a combination, or returns None if the
    /// cards form neither a set nor a run
    pub fn new(owner: SessionId, cards: &[Card]) -> Option<Combination> {
        if let Some(rank) = as_set(cards) {
            return Some(Combination {
                kind: CombinationKind::Set { rank },
                cards: cards.to_vec(),
                owner,
            });
        }

        as_run(cards).map(|(low, ordered)| Combination {
            kind: CombinationKind::Run { low },
            cards: ordered,
            owner,
        })
    }

    /// Concatenated codes, the form clients use to address a combination
    pub fn codes(&self) -> String {
        shared::join_codes(&self.cards)
    }

    /// Attempts to extend the combination with `card`
    ///
    /// Sets accept a card of their rank in an unused suit, or a joker. Runs
    /// accept a card of their suit directly below the lowest or above the
    /// highest position. A joker goes on the low end when the run already
    /// reaches the high Ace, otherwise on the high end. Returns false and
    /// leaves the combination untouched when the card does not fit.
    pub fn try_attach(&mut self, card: Card) -> bool {
        if self.cards.len() >= MAX_COMBINATION_CARDS {
            return false;
        }

        match self.kind {
            CombinationKind::Set { rank } => self.attach_to_set(rank, card),
            CombinationKind::Run { low } => self.attach_to_run(low, card),
        }
    }

    fn attach_to_set(&mut self, rank: u8, card: Card) -> bool {
        if self.cards.len() >= MAX_SET_CARDS {
            return false;
        }

        let fits = match card {
            Card::Joker => true,
            Card::Standard { rank: r, suit } => {
                r == rank && !self.cards.iter().any(|c| c.suit() == Some(suit))
            }
        };
        if fits {
            self.cards.push(card);
        }
        fits
    }

    fn attach_to_run(&mut self, low: u8, card: Card) -> bool {
        // Jokers only: any card re-anchors the run
        if self.cards.iter().all(Card::is_wild) {
            let mut candidate = self.cards.clone();
            candidate.push(card);
            return match as_run(&candidate) {
                Some((low, ordered)) => {
                    self.kind = CombinationKind::Run { low };
                    self.cards = ordered;
                    true
                }
                None => false,
            };
        }

        let high = low + self.cards.len() as u8 - 1;
        let at_front = match card {
            Card::Joker => {
                if high == HIGH_ACE && low > LOW_ACE {
                    true
                } else if high < HIGH_ACE {
                    false
                } else {
                    return false;
                }
            }
            Card::Standard { rank, suit } => {
                if self.suit() != Some(suit) {
                    return false;
                }
                if rank == LOW_ACE && high == 13 {
                    false
                } else if rank == LOW_ACE && low == 2 {
                    true
                } else if rank != LOW_ACE && rank + 1 == low {
                    true
                } else if rank != LOW_ACE && rank == high + 1 {
                    false
                } else {
                    return false;
                }
            }
        };

        if at_front {
            self.cards.insert(0, card);
            self.kind = CombinationKind::Run { low: low - 1 };
        } else {
            self.cards.push(card);
        }
        true
    }

    /// Suit shared by the real cards, or None for a set or an all-joker run
    fn suit(&self) -> Option<Suit> {
        match self.kind {
            CombinationKind::Set { .. } => None,
            CombinationKind::Run { .. } => self.cards.iter().find_map(Card::suit),
        }
    }
}

/// Returns the shared rank when `cards` form a valid set
fn as_set(cards: &[Card]) -> Option<u8> {
    if cards.len() < MIN_COMBINATION_CARDS || cards.len() > MAX_SET_CARDS {
        return None;
    }

    let mut rank = None;
    let mut suits: Vec<Suit> = Vec::with_capacity(MAX_SET_CARDS);
    for card in cards {
        if let Card::Standard { rank: r, suit } = *card {
            if rank.is_some_and(|existing| existing != r) || suits.contains(&suit) {
                return None;
            }
            rank = Some(r);
            suits.push(suit);
        }
    }

    // A set needs at least one real card to name its rank
    rank
}

/// Returns the lowest position and the ordered cards when `cards` form a
/// valid run, trying Ace low before Ace high
fn as_run(cards: &[Card]) -> Option<(u8, Vec<Card>)> {
    if cards.len() < MIN_COMBINATION_CARDS || cards.len() > usize::from(HIGH_ACE) {
        return None;
    }

    let reals: Vec<Card> = cards.iter().copied().filter(|c| !c.is_wild()).collect();
    let jokers = cards.len() - reals.len();
    if reals.is_empty() {
        return Some((LOW_ACE, cards.to_vec()));
    }

    let suit = reals[0].suit();
    if reals.iter().any(|c| c.suit() != suit) {
        return None;
    }

    let has_ace = reals.iter().any(|c| c.rank() == Some(LOW_ACE));
    layout_run(&reals, jokers, false).or_else(|| {
        if has_ace {
            layout_run(&reals, jokers, true)
        } else {
            None
        }
    })
}

/// Places real cards at their positions and fills gaps with jokers. Spare
/// jokers extend the top of the run first, then the bottom.
fn layout_run(reals: &[Card], jokers: usize, ace_high: bool) -> Option<(u8, Vec<Card>)> {
    let mut placed: Vec<(u8, Card)> = reals
        .iter()
        .filter_map(|card| {
            card.rank().map(|rank| {
                let position = if rank == LOW_ACE && ace_high { HIGH_ACE } else { rank };
                (position, *card)
            })
        })
        .collect();
    placed.sort_by_key(|(position, _)| *position);

    if placed.windows(2).any(|pair| pair[0].0 == pair[1].0) {
        return None;
    }

    let min = placed.first()?.0;
    let max = placed.last()?.0;
    let span = usize::from(max - min) + 1;
    let gaps = span - placed.len();
    if gaps > jokers {
        return None;
    }

    let spare = jokers - gaps;
    let above = spare.min(usize::from(HIGH_ACE - max));
    let below = spare - above;
    if below > usize::from(min - LOW_ACE) {
        return None;
    }

    let low = min - below as u8;
    let high = max + above as u8;
    let mut ordered = Vec::with_capacity(reals.len() + jokers);
    let mut next = placed.iter().peekable();
    for position in low..=high {
        match next.peek() {
            Some((p, card)) if *p == position => {
                ordered.push(*card);
                next.next();
            }
            _ => ordered.push(Card::Joker),
        }
    }

    Some((low, ordered))
}
