//! The game session state machine.
//!
//! A session is created directly in the `Active` state by a deal,
//! tracks turn order and per-participant books, and ends exclusively
//! when the dealer asks for the winner. `Ended` is terminal.

use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt,
};
use thiserror::Error;
use uuid::Uuid;

use super::entities::{Card, Hand, PlayerName, Rank};

/// The coordination-protocol error taxonomy. Every variant is
/// recoverable at the manager boundary: a rejected request yields a
/// failure response and the manager keeps serving other peers.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("player name already registered")]
    DuplicateName,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Player is in an ongoing game")]
    PlayerBusy,
    #[error("no ports available in the configured range")]
    NoPortsAvailable,
    #[error("Not enough players to start the game. You need at least 2 players.")]
    InsufficientPlayers,
    #[error("Game not found")]
    GameNotFound,
    #[error("You are not the dealer of this game")]
    NotAuthorized,
    #[error("not your turn")]
    NotYourTurn,
    #[error("Invalid command")]
    MalformedMessage,
    #[error("peer unreachable")]
    PeerUnreachable,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Forming,
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Forming => "forming",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        write!(f, "{repr}")
    }
}

/// Result of a card request within an active session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TurnOutcome {
    /// The opponent held the rank: all matching cards moved to the
    /// requester, whose turn continues. `books` holds any ranks the
    /// transfer completed.
    Caught {
        opponent: PlayerName,
        cards: Vec<Card>,
        books: Vec<Rank>,
    },
    /// The opponent held none ("go fish"): the turn passed to `next`.
    GoFish { next: PlayerName },
}

/// Read-only snapshot of a session for `query_games` responses.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub dealer: PlayerName,
    pub status: SessionStatus,
    pub players: Vec<PlayerName>,
    pub winner: Option<PlayerName>,
}

#[derive(Debug)]
pub struct GameSession {
    id: Uuid,
    dealer: PlayerName,
    participants: Vec<PlayerName>,
    hands: HashMap<PlayerName, Hand>,
    books: HashMap<PlayerName, Vec<Rank>>,
    departed: HashSet<PlayerName>,
    status: SessionStatus,
    winner: Option<PlayerName>,
    turn_idx: usize,
}

impl GameSession {
    /// Creates an active session from a completed deal. Turn order is
    /// the order of `participants` (registration order). Hands dealt
    /// with four of a kind already in them count as books immediately.
    #[must_use]
    pub fn deal(dealer: PlayerName, participants: Vec<PlayerName>, hands: Vec<Hand>) -> Self {
        let mut books: HashMap<PlayerName, Vec<Rank>> = HashMap::new();
        let mut hands: HashMap<PlayerName, Hand> = participants
            .iter()
            .cloned()
            .zip(hands)
            .collect();
        for (name, hand) in &mut hands {
            books.insert(name.clone(), hand.extract_books());
        }
        Self {
            id: Uuid::new_v4(),
            dealer,
            participants,
            hands,
            books,
            departed: HashSet::new(),
            status: SessionStatus::Active,
            winner: None,
            turn_idx: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn dealer(&self) -> &PlayerName {
        &self.dealer
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn winner(&self) -> Option<&PlayerName> {
        self.winner.as_ref()
    }

    #[must_use]
    pub fn participants(&self) -> &[PlayerName] {
        &self.participants
    }

    #[must_use]
    pub fn is_participant(&self, name: &PlayerName) -> bool {
        self.participants.contains(name)
    }

    /// The participant whose turn it is. `None` once the session ended.
    #[must_use]
    pub fn current_turn(&self) -> Option<&PlayerName> {
        match self.status {
            SessionStatus::Ended => None,
            _ => self.participants.get(self.turn_idx),
        }
    }

    #[must_use]
    pub fn hand_of(&self, name: &PlayerName) -> Option<&Hand> {
        self.hands.get(name)
    }

    #[must_use]
    pub fn books_of(&self, name: &PlayerName) -> &[Rank] {
        self.books.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            dealer: self.dealer.clone(),
            status: self.status,
            players: self.participants.clone(),
            winner: self.winner.clone(),
        }
    }

    /// Handles a card request from `requester` aimed at `opponent`.
    ///
    /// Rejected with `NotYourTurn` when the requester does not hold the
    /// turn, and `PlayerNotFound` when the opponent is not a (distinct,
    /// still present) participant. A hit keeps the requester's turn; a
    /// miss passes it.
    pub fn request_cards(
        &mut self,
        requester: &PlayerName,
        opponent: &PlayerName,
        rank: Rank,
    ) -> Result<TurnOutcome, GameError> {
        if self.status != SessionStatus::Active {
            return Err(GameError::GameNotFound);
        }
        if self.current_turn() != Some(requester) {
            return Err(GameError::NotYourTurn);
        }
        if opponent == requester
            || !self.is_participant(opponent)
            || self.departed.contains(opponent)
        {
            return Err(GameError::PlayerNotFound);
        }

        let taken = self
            .hands
            .get_mut(opponent)
            .ok_or(GameError::PlayerNotFound)?
            .take_rank(rank);
        if taken.is_empty() {
            self.advance_turn();
            let next = self.participants[self.turn_idx].clone();
            return Ok(TurnOutcome::GoFish { next });
        }

        let hand = self
            .hands
            .get_mut(requester)
            .ok_or(GameError::PlayerNotFound)?;
        hand.add(taken.iter().copied());
        let new_books = hand.extract_books();
        self.books
            .entry(requester.clone())
            .or_default()
            .extend(new_books.iter().copied());
        Ok(TurnOutcome::Caught {
            opponent: opponent.clone(),
            cards: taken,
            books: new_books,
        })
    }

    /// Takes a departed participant out of the turn rotation so later
    /// passes skip them, and, if they held the turn, moves it on
    /// immediately. Returns the new turn holder when the turn moved.
    pub fn mark_departed(&mut self, name: &PlayerName) -> Option<PlayerName> {
        if self.status != SessionStatus::Active || !self.is_participant(name) {
            return None;
        }
        self.departed.insert(name.clone());
        if self.current_turn() == Some(name) {
            self.advance_turn();
            return self.participants.get(self.turn_idx).cloned();
        }
        None
    }

    /// Moves the turn to the next participant still present. With
    /// nobody left, the index comes full circle and the session simply
    /// waits for the dealer to end it.
    fn advance_turn(&mut self) {
        for _ in 0..self.participants.len() {
            self.turn_idx = (self.turn_idx + 1) % self.participants.len();
            if !self.departed.contains(&self.participants[self.turn_idx]) {
                return;
            }
        }
    }

    /// Ends the session and determines the winner: the participant with
    /// the strictly greatest book count. Ties (including everyone at
    /// zero) yield no winner. Only the dealer may end the session.
    pub fn end(&mut self, requester: &PlayerName) -> Result<Option<PlayerName>, GameError> {
        if self.status == SessionStatus::Ended {
            return Err(GameError::GameNotFound);
        }
        if requester != &self.dealer {
            return Err(GameError::NotAuthorized);
        }
        let max_books = self
            .participants
            .iter()
            .map(|name| self.books_of(name).len())
            .max()
            .unwrap_or(0);
        let mut leaders = self
            .participants
            .iter()
            .filter(|name| self.books_of(name).len() == max_books);
        let winner = match (leaders.next(), leaders.next()) {
            (Some(leader), None) => Some(leader.clone()),
            _ => None,
        };
        self.status = SessionStatus::Ended;
        self.winner = winner.clone();
        Ok(winner)
    }
}
