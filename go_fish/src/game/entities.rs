use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use super::constants::{BOOK_SIZE, DECK_SIZE, MAX_NAME_LENGTH};
use super::session::GameError;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Self; 4] = [Self::Hearts, Self::Diamonds, Self::Clubs, Self::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "Hearts",
            Self::Diamonds => "Diamonds",
            Self::Clubs => "Clubs",
            Self::Spades => "Spades",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Suit {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hearts" => Ok(Self::Hearts),
            "Diamonds" => Ok(Self::Diamonds),
            "Clubs" => Ok(Self::Clubs),
            "Spades" => Ok(Self::Spades),
            _ => Err(GameError::MalformedMessage),
        }
    }
}

/// A card rank. Books are made of four cards of the same rank.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Self; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Rank {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2" => Ok(Self::Two),
            "3" => Ok(Self::Three),
            "4" => Ok(Self::Four),
            "5" => Ok(Self::Five),
            "6" => Ok(Self::Six),
            "7" => Ok(Self::Seven),
            "8" => Ok(Self::Eight),
            "9" => Ok(Self::Nine),
            "10" => Ok(Self::Ten),
            "J" | "j" => Ok(Self::Jack),
            "Q" | "q" => Ok(Self::Queen),
            "K" | "k" => Ok(Self::King),
            "A" | "a" => Ok(Self::Ace),
            _ => Err(GameError::MalformedMessage),
        }
    }
}

/// A playing card. Equality is by (rank, suit). The display form,
/// `"K of Spades"`, is the name pushed over the data channel.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rank, suit) = s.split_once(" of ").ok_or(GameError::MalformedMessage)?;
        Ok(Self {
            rank: rank.parse()?,
            suit: suit.parse()?,
        })
    }
}

/// A full deck of 52 unique cards. Instantiated once per manager
/// process and reshuffled before each deal.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    #[must_use]
    pub fn new() -> Self {
        let cards = Rank::ALL
            .into_iter()
            .flat_map(|rank| Suit::ALL.into_iter().map(move |suit| Card::new(rank, suit)))
            .collect();
        Self { cards }
    }

    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
    }

    /// Deals `n_players` disjoint hands of `floor(52 / n_players)` cards
    /// each, consumed left-to-right from the current order. Remainder
    /// cards stay undealt. Zero players yields zero hands; more players
    /// than cards yields all-empty hands.
    #[must_use]
    pub fn deal(&self, n_players: usize) -> Vec<Hand> {
        if n_players == 0 {
            return Vec::new();
        }
        let per_player = DECK_SIZE / n_players;
        if per_player == 0 {
            return vec![Hand::default(); n_players];
        }
        self.cards
            .chunks_exact(per_player)
            .take(n_players)
            .map(|chunk| Hand::from(chunk.to_vec()))
            .collect()
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

/// A mutable multiset of cards owned by one participant.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Hand(Vec<Card>);

impl From<Vec<Card>> for Hand {
    fn from(cards: Vec<Card>) -> Self {
        Self(cards)
    }
}

impl Hand {
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn add(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.0.extend(cards);
    }

    /// Removes one instance of each given card, ignoring cards not held.
    /// Used to apply a `taken` notification to the local hand.
    pub fn remove_exact(&mut self, cards: &[Card]) {
        for card in cards {
            if let Some(idx) = self.0.iter().position(|held| held == card) {
                self.0.swap_remove(idx);
            }
        }
    }

    /// Removes and returns every card of the given rank.
    pub fn take_rank(&mut self, rank: Rank) -> Vec<Card> {
        let (taken, kept) = self.0.drain(..).partition(|card| card.rank == rank);
        self.0 = kept;
        taken
    }

    #[must_use]
    pub fn count_rank(&self, rank: Rank) -> usize {
        self.0.iter().filter(|card| card.rank == rank).count()
    }

    /// Extracts every completed book (a rank held exactly four times),
    /// removing the four cards and returning the ranks. Idempotent:
    /// a second call without new cards finds nothing.
    pub fn extract_books(&mut self) -> Vec<Rank> {
        let mut counts: HashMap<Rank, usize> = HashMap::new();
        for card in &self.0 {
            *counts.entry(card.rank).or_default() += 1;
        }
        let mut books: Vec<Rank> = counts
            .into_iter()
            .filter_map(|(rank, count)| (count == BOOK_SIZE).then_some(rank))
            .collect();
        books.sort();
        for rank in &books {
            self.0.retain(|card| card.rank != *rank);
        }
        books
    }
}

/// A player name: unique within a registry, whitespace-free, and
/// length-capped so it can travel inside space-delimited messages.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn new(s: &str) -> Self {
        let mut name: String = s
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        name.truncate(MAX_NAME_LENGTH);
        Self(name)
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for PlayerName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for PlayerName {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for PlayerName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn deck_has_52_unique_cards() {
        let deck = Deck::new();
        assert_eq!(deck.cards().len(), DECK_SIZE);
        let unique: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(unique.len(), DECK_SIZE);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let reference: HashSet<Card> = Deck::new().cards().iter().copied().collect();
        let mut deck = Deck::new();
        deck.shuffle();
        let shuffled: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(shuffled, reference);
        assert_eq!(deck.cards().len(), DECK_SIZE);
    }

    #[test]
    fn deal_produces_disjoint_hands() {
        let mut deck = Deck::new();
        deck.shuffle();
        let hands = deck.deal(3);
        assert_eq!(hands.len(), 3);
        let mut seen = HashSet::new();
        for hand in &hands {
            assert_eq!(hand.len(), 17);
            for card in hand.cards() {
                assert!(seen.insert(*card), "{card} dealt twice");
            }
        }
        // One card stays undealt with three players.
        assert_eq!(seen.len(), 51);
    }

    #[test]
    fn deal_to_zero_players_is_empty() {
        assert!(Deck::new().deal(0).is_empty());
    }

    #[test]
    fn deal_to_more_players_than_cards_yields_empty_hands() {
        let hands = Deck::new().deal(53);
        assert_eq!(hands.len(), 53);
        assert!(hands.iter().all(Hand::is_empty));
    }

    #[test]
    fn card_display_matches_wire_names() {
        let card = Card::new(Rank::Ten, Suit::Hearts);
        assert_eq!(card.to_string(), "10 of Hearts");
        let card = Card::new(Rank::King, Suit::Spades);
        assert_eq!(card.to_string(), "K of Spades");
    }

    #[test]
    fn card_parses_from_wire_name() {
        let card: Card = "A of Diamonds".parse().unwrap();
        assert_eq!(card, Card::new(Rank::Ace, Suit::Diamonds));
        assert!("A of Nowhere".parse::<Card>().is_err());
        assert!("not a card".parse::<Card>().is_err());
    }

    #[test]
    fn take_rank_removes_all_matches() {
        let mut hand = Hand::from(vec![
            Card::new(Rank::King, Suit::Hearts),
            Card::new(Rank::Two, Suit::Clubs),
            Card::new(Rank::King, Suit::Spades),
        ]);
        let taken = hand.take_rank(Rank::King);
        assert_eq!(taken.len(), 2);
        assert_eq!(hand.len(), 1);
        assert!(hand.take_rank(Rank::King).is_empty());
    }

    #[test]
    fn extract_books_is_idempotent() {
        let mut hand = Hand::from(vec![
            Card::new(Rank::Queen, Suit::Hearts),
            Card::new(Rank::Queen, Suit::Diamonds),
            Card::new(Rank::Queen, Suit::Clubs),
            Card::new(Rank::Queen, Suit::Spades),
            Card::new(Rank::Two, Suit::Hearts),
        ]);
        assert_eq!(hand.extract_books(), vec![Rank::Queen]);
        assert_eq!(hand.len(), 1);
        assert!(hand.extract_books().is_empty());
        assert_eq!(hand.len(), 1);
    }

    #[test]
    fn three_of_a_kind_is_not_a_book() {
        let mut hand = Hand::from(vec![
            Card::new(Rank::Nine, Suit::Hearts),
            Card::new(Rank::Nine, Suit::Diamonds),
            Card::new(Rank::Nine, Suit::Clubs),
        ]);
        assert!(hand.extract_books().is_empty());
        assert_eq!(hand.len(), 3);
    }

    #[test]
    fn remove_exact_removes_single_instances() {
        let mut hand = Hand::from(vec![
            Card::new(Rank::Five, Suit::Hearts),
            Card::new(Rank::Five, Suit::Clubs),
        ]);
        hand.remove_exact(&[Card::new(Rank::Five, Suit::Hearts)]);
        assert_eq!(hand.cards(), &[Card::new(Rank::Five, Suit::Clubs)]);
    }

    #[test]
    fn player_name_is_normalized() {
        assert_eq!(PlayerName::new("two words").to_string(), "two_words");
        let long = "x".repeat(100);
        assert_eq!(PlayerName::new(&long).to_string().len(), MAX_NAME_LENGTH);
    }
}
