//! The coordinator: registry + deck + the one session slot.
//!
//! `Manager` owns all mutable coordination state and is driven by one
//! event-loop thread, so every control message is handled atomically
//! from parse to response. Network side effects (the deal push, the
//! end-of-game broadcast) are returned as [`Effect`] values and carried
//! out by the caller after state mutation completes, keeping I/O out of
//! the critical path.

use log::warn;
use uuid::Uuid;

use crate::game::{
    constants::MIN_PLAYERS,
    entities::{Card, Deck, PlayerName, Rank},
    session::{GameError, GameSession, SessionStatus, SessionSummary, TurnOutcome},
};
use crate::net::messages::ControlRequest;
use crate::registry::{PlayerRecord, Registry};

/// Hand pushes the caller must deliver after a successful deal.
#[derive(Clone, Debug)]
pub struct DealPlan {
    pub session_id: Uuid,
    pub hands: Vec<(PlayerRecord, Vec<Card>)>,
    /// The participant to signal first.
    pub first_turn: PlayerName,
}

/// A network side effect owed after a control response.
#[derive(Clone, Debug)]
pub enum Effect {
    Deal(DealPlan),
    Finish { winner: Option<PlayerName> },
}

#[derive(Debug, Default)]
pub struct Manager {
    registry: Registry,
    deck: Deck,
    session: Option<GameSession>,
}

impl Manager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatches one raw control message and renders the textual
    /// response. Malformed input never escapes as an error; it becomes
    /// a failure response and the manager keeps serving.
    pub fn dispatch(&mut self, raw: &str) -> (String, Option<Effect>) {
        let request = match raw.parse::<ControlRequest>() {
            Ok(request) => request,
            Err(_) => {
                warn!("rejected control message: {raw:?}");
                return ("FAILURE: Invalid command".to_string(), None);
            }
        };
        match request {
            ControlRequest::Register(record) => (self.register(record), None),
            ControlRequest::Deregister { name } => (self.deregister(&name), None),
            ControlRequest::QueryPlayers => (self.query_players(), None),
            ControlRequest::QueryGames => (self.query_games(), None),
            ControlRequest::StartGame { dealer, k } => self.start_game(&dealer, k),
            ControlRequest::EndGame {
                session_id,
                requester,
            } => self.end_game(&session_id, &requester),
        }
    }

    fn register(&mut self, record: PlayerRecord) -> String {
        match self.registry.register(record) {
            Ok(()) => "SUCCESS".to_string(),
            Err(_) => "FAILURE".to_string(),
        }
    }

    fn deregister(&mut self, name: &PlayerName) -> String {
        // The busy check and the removal happen under the same dispatch,
        // so a concurrent start_game cannot slip between them.
        if let Some(session) = &self.session {
            if session.status() != SessionStatus::Ended && session.is_participant(name) {
                return format!("FAILURE: {}", GameError::PlayerBusy);
            }
        }
        match self.registry.deregister(name) {
            Ok(()) => "SUCCESS".to_string(),
            Err(error) => format!("FAILURE: {error}"),
        }
    }

    fn query_players(&self) -> String {
        let (count, records) = self.registry.query();
        let records = serde_json::to_string(&records).unwrap_or_else(|error| {
            warn!("failed to render player records: {error}");
            "[]".to_string()
        });
        format!("({count}, {records})")
    }

    fn query_games(&self) -> String {
        let sessions: Vec<SessionSummary> =
            self.session.iter().map(GameSession::summary).collect();
        let count = sessions.len();
        let sessions = serde_json::to_string(&sessions).unwrap_or_else(|error| {
            warn!("failed to render session summaries: {error}");
            "[]".to_string()
        });
        format!("({count}, {sessions})")
    }

    fn start_game(&mut self, dealer: &PlayerName, k: usize) -> (String, Option<Effect>) {
        if let Some(session) = &self.session {
            if session.status() != SessionStatus::Ended {
                return ("FAILURE: A game is already in progress".to_string(), None);
            }
        }
        if self.registry.get(dealer).is_none() {
            return (format!("FAILURE: {}", GameError::PlayerNotFound), None);
        }
        let (count, records) = self.registry.query();
        if count < MIN_PLAYERS || count < k {
            return (GameError::InsufficientPlayers.to_string(), None);
        }

        self.deck.shuffle();
        let hands = self.deck.deal(count);
        let participants = self.registry.names();
        let plan_hands = records
            .into_iter()
            .zip(hands.iter().map(|hand| hand.cards().to_vec()))
            .collect();
        let session = GameSession::deal(dealer.clone(), participants.clone(), hands);
        let session_id = session.id();
        let first_turn = session
            .current_turn()
            .cloned()
            .unwrap_or_else(|| dealer.clone());
        self.session = Some(session);

        let roster = participants
            .iter()
            .map(PlayerName::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        (
            format!("SUCCESS {session_id} {roster}"),
            Some(Effect::Deal(DealPlan {
                session_id,
                hands: plan_hands,
                first_turn,
            })),
        )
    }

    fn end_game(&mut self, session_id: &str, requester: &PlayerName) -> (String, Option<Effect>) {
        let not_found = || format!("FAILURE: {}", GameError::GameNotFound);
        let Ok(id) = Uuid::parse_str(session_id) else {
            return (not_found(), None);
        };
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id() == id && s.status() != SessionStatus::Ended)
        else {
            return (not_found(), None);
        };
        match session.end(requester) {
            Ok(winner) => {
                let name = winner
                    .as_ref()
                    .map_or_else(|| "No winner".to_string(), PlayerName::to_string);
                (
                    format!("SUCCESS: Game has ended. The winner is {name}"),
                    Some(Effect::Finish { winner }),
                )
            }
            Err(error) => (format!("FAILURE: {error}"), None),
        }
    }

    /// Turn-exchange path for the data channel.
    pub fn handle_turn(
        &mut self,
        requester: &PlayerName,
        opponent: &PlayerName,
        rank: Rank,
    ) -> Result<TurnOutcome, GameError> {
        self.session
            .as_mut()
            .ok_or(GameError::GameNotFound)?
            .request_cards(requester, opponent, rank)
    }

    /// Degrades the session after a data-channel disconnect: the leaver
    /// drops out of the turn rotation, and if they held the turn it
    /// moves on. Returns the new turn holder.
    pub fn handle_disconnect(&mut self, name: &PlayerName) -> Option<PlayerName> {
        self.session.as_mut()?.mark_departed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_line(name: &str) -> String {
        format!("register {name} 127.0.0.1 5000 5001 5002")
    }

    fn manager_with_players(names: &[&str]) -> Manager {
        let mut manager = Manager::new();
        for name in names {
            let (resp, _) = manager.dispatch(&register_line(name));
            assert_eq!(resp, "SUCCESS");
        }
        manager
    }

    fn start(manager: &mut Manager, dealer: &str, k: usize) -> (String, DealPlan) {
        let (resp, effect) = manager.dispatch(&format!("start_game {dealer} {k}"));
        match effect {
            Some(Effect::Deal(plan)) => (resp, plan),
            _ => panic!("expected a deal effect, got response {resp:?}"),
        }
    }

    #[test]
    fn register_twice_fails_without_side_effects() {
        let mut manager = manager_with_players(&["alice"]);
        let (resp, _) = manager.dispatch(&register_line("alice"));
        assert_eq!(resp, "FAILURE");
        assert_eq!(manager.registry().len(), 1);
    }

    #[test]
    fn malformed_messages_yield_failure_responses() {
        let mut manager = Manager::new();
        for raw in ["", "dance", "register alice", "start_game alice two"] {
            let (resp, effect) = manager.dispatch(raw);
            assert_eq!(resp, "FAILURE: Invalid command");
            assert!(effect.is_none());
        }
    }

    #[test]
    fn query_players_reports_count_and_records() {
        let mut manager = manager_with_players(&["alice", "bob"]);
        let (resp, _) = manager.dispatch("query_players");
        assert!(resp.starts_with("(2, ["));
        assert!(resp.contains("\"alice\""));
        assert!(resp.contains("\"bob\""));
    }

    #[test]
    fn start_game_needs_two_players() {
        let mut manager = manager_with_players(&["alice"]);
        let (resp, effect) = manager.dispatch("start_game alice 2");
        assert_eq!(
            resp,
            "Not enough players to start the game. You need at least 2 players."
        );
        assert!(effect.is_none());
        assert!(manager.session().is_none());
    }

    #[test]
    fn start_game_honors_the_k_parameter() {
        let mut manager = manager_with_players(&["alice", "bob"]);
        let (resp, effect) = manager.dispatch("start_game alice 3");
        assert_eq!(
            resp,
            "Not enough players to start the game. You need at least 2 players."
        );
        assert!(effect.is_none());
    }

    #[test]
    fn start_game_by_an_unregistered_dealer_fails() {
        let mut manager = manager_with_players(&["alice", "bob"]);
        let (resp, _) = manager.dispatch("start_game ghost 2");
        assert_eq!(resp, "FAILURE: Player not found");
    }

    #[test]
    fn start_game_deals_17_cards_to_each_of_three_players() {
        let mut manager = manager_with_players(&["p1", "p2", "p3"]);
        let (resp, plan) = start(&mut manager, "p1", 2);
        assert!(resp.starts_with("SUCCESS "));
        assert!(resp.ends_with("p1 p2 p3"));
        assert_eq!(plan.hands.len(), 3);
        for (_, cards) in &plan.hands {
            assert_eq!(cards.len(), 17);
        }
        assert_eq!(plan.first_turn, PlayerName::new("p1"));

        let session = manager.session().unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.participants().len(), 3);
    }

    #[test]
    fn start_game_with_more_players_than_cards_deals_empty_hands() {
        let mut manager = Manager::new();
        for i in 1..=53 {
            let (resp, _) = manager.dispatch(&register_line(&format!("p{i}")));
            assert_eq!(resp, "SUCCESS");
        }
        let (resp, plan) = start(&mut manager, "p1", 2);
        assert!(resp.starts_with("SUCCESS "));
        assert_eq!(plan.hands.len(), 53);
        assert!(plan.hands.iter().all(|(_, cards)| cards.is_empty()));
    }

    #[test]
    fn second_start_while_active_is_rejected() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        start(&mut manager, "p1", 2);
        let (resp, effect) = manager.dispatch("start_game p2 2");
        assert_eq!(resp, "FAILURE: A game is already in progress");
        assert!(effect.is_none());
    }

    #[test]
    fn deregister_is_blocked_while_in_a_session() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        start(&mut manager, "p1", 2);
        let (resp, _) = manager.dispatch("de-register p2");
        assert_eq!(resp, "FAILURE: Player is in an ongoing game");
        assert_eq!(manager.registry().len(), 2);
    }

    #[test]
    fn deregister_succeeds_after_the_session_ends() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        let (_, plan) = start(&mut manager, "p1", 2);
        let (resp, _) = manager.dispatch(&format!("end_game {} p1", plan.session_id));
        assert!(resp.starts_with("SUCCESS: Game has ended. The winner is "));
        let (resp, _) = manager.dispatch("de-register p2");
        assert_eq!(resp, "SUCCESS");
    }

    #[test]
    fn deregister_unknown_player_fails() {
        let mut manager = Manager::new();
        let (resp, _) = manager.dispatch("de-register ghost");
        assert_eq!(resp, "FAILURE: Player not found");
    }

    #[test]
    fn end_game_requires_the_right_session_id() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        start(&mut manager, "p1", 2);
        let (resp, _) = manager.dispatch(&format!("end_game {} p1", Uuid::new_v4()));
        assert_eq!(resp, "FAILURE: Game not found");
        let (resp, _) = manager.dispatch("end_game not-a-uuid p1");
        assert_eq!(resp, "FAILURE: Game not found");
    }

    #[test]
    fn end_game_by_a_non_dealer_is_rejected() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        let (_, plan) = start(&mut manager, "p1", 2);
        let (resp, effect) = manager.dispatch(&format!("end_game {} p2", plan.session_id));
        assert_eq!(resp, "FAILURE: You are not the dealer of this game");
        assert!(effect.is_none());
        assert_eq!(
            manager.session().unwrap().status(),
            SessionStatus::Active
        );
    }

    #[test]
    fn query_games_reports_the_session_slot() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        let (resp, _) = manager.dispatch("query_games");
        assert!(resp.starts_with("(0, ["));

        let (_, plan) = start(&mut manager, "p1", 2);
        let (resp, _) = manager.dispatch("query_games");
        assert!(resp.starts_with("(1, ["));
        assert!(resp.contains(&plan.session_id.to_string()));
        assert!(resp.contains("\"active\""));

        manager.dispatch(&format!("end_game {} p1", plan.session_id));
        let (resp, _) = manager.dispatch("query_games");
        assert!(resp.contains("\"ended\""));
    }

    #[test]
    fn handle_turn_rejects_out_of_turn_requests() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        start(&mut manager, "p1", 2);
        let err = manager
            .handle_turn(&"p2".into(), &"p1".into(), Rank::Ace)
            .unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
    }

    #[test]
    fn handle_turn_without_a_session_fails() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        let err = manager
            .handle_turn(&"p1".into(), &"p2".into(), Rank::Ace)
            .unwrap_err();
        assert_eq!(err, GameError::GameNotFound);
    }

    #[test]
    fn disconnect_of_the_turn_holder_advances_the_turn() {
        let mut manager = manager_with_players(&["p1", "p2"]);
        start(&mut manager, "p1", 2);
        assert_eq!(
            manager.handle_disconnect(&"p1".into()),
            Some(PlayerName::new("p2"))
        );
        assert_eq!(manager.handle_disconnect(&"p1".into()), None);
    }
}
