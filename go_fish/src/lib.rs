//! # Go Fish
//!
//! A session-coordination library for a networked Go Fish card game:
//! one manager process tracks player registration, deals from a shared
//! deck, and arbitrates the game lifecycle; player processes register,
//! receive hands over per-player data channels, and exchange turns.
//!
//! ## Architecture
//!
//! - **Control channel**: UDP request/response, textual space-delimited
//!   commands (`register`, `de-register`, `query_players`,
//!   `query_games`, `start_game`, `end_game`).
//! - **Data channel**: one TCP connection per dealt player, carrying
//!   newline-delimited text: the start notice, the dealt hand, turn
//!   signals and card-request exchanges, and the final `Game over`
//!   sentinel.
//!
//! All coordinator state lives in [`Manager`], owned by the single
//! event-loop thread in [`net::server`], so every control message is
//! handled atomically.
//!
//! ## Core Modules
//!
//! - [`game`]: cards, hands, books, and the session state machine
//! - [`registry`]: player name to endpoint mapping
//! - [`manager`]: control-protocol dispatch over registry + session
//! - [`net`]: wire vocabulary, line codec, client, and server loop
//! - [`player`]: the peer-side session loop
//!
//! ## Example
//!
//! ```
//! use go_fish::game::entities::Deck;
//!
//! let mut deck = Deck::new();
//! deck.shuffle();
//! let hands = deck.deal(3);
//! assert_eq!(hands.len(), 3);
//! ```

/// Core game logic and entities.
pub mod game;
pub use game::{
    constants,
    entities::{Card, Deck, Hand, PlayerName, Rank, Suit},
    session::{GameError, GameSession, SessionStatus, TurnOutcome},
};

/// The coordinator.
pub mod manager;
pub use manager::{DealPlan, Effect, Manager};

/// Networking components.
pub mod net;
pub use net::{client::ControlClient, messages, server, utils};

/// The player peer.
pub mod player;
pub use player::{MoveSource, PlayerMove, PlayerPeer};

/// Port allocation.
pub mod ports;
pub use ports::PortAllocator;

/// The player registry.
pub mod registry;
pub use registry::{PlayerRecord, Registry};
