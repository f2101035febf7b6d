//! Game-wide constants.

/// Number of cards in a full deck.
pub const DECK_SIZE: usize = 52;

/// Number of same-rank cards that complete a book.
pub const BOOK_SIZE: usize = 4;

/// Maximum length of a player name. Longer names are truncated
/// at registration time.
pub const MAX_NAME_LENGTH: usize = 32;

/// Minimum number of registered players required to start a game.
pub const MIN_PLAYERS: usize = 2;
