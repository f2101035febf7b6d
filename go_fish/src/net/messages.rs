//! The textual wire vocabulary.
//!
//! Control requests are single space-delimited datagrams, one request
//! per response. Data-channel messages are newline-delimited lines on
//! the per-player TCP connection, ending with the literal `Game over`
//! sentinel.

use std::{fmt, str::FromStr};

use crate::game::{
    entities::{Card, PlayerName, Rank},
    session::GameError,
};
use crate::registry::PlayerRecord;

/// A control-channel request, as understood by the manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlRequest {
    Register(PlayerRecord),
    Deregister { name: PlayerName },
    QueryPlayers,
    QueryGames,
    StartGame { dealer: PlayerName, k: usize },
    EndGame { session_id: String, requester: PlayerName },
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Register(r) => write!(
                f,
                "register {} {} {} {} {}",
                r.name, r.address, r.control_port, r.turn_port, r.data_port
            ),
            Self::Deregister { name } => write!(f, "de-register {name}"),
            Self::QueryPlayers => write!(f, "query_players"),
            Self::QueryGames => write!(f, "query_games"),
            Self::StartGame { dealer, k } => write!(f, "start_game {dealer} {k}"),
            Self::EndGame {
                session_id,
                requester,
            } => write!(f, "end_game {session_id} {requester}"),
        }
    }
}

impl FromStr for ControlRequest {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["register", name, address, control, turn, data] => {
                let parse_port =
                    |s: &str| s.parse::<u16>().map_err(|_| GameError::MalformedMessage);
                Ok(Self::Register(PlayerRecord {
                    name: PlayerName::new(name),
                    address: (*address).to_string(),
                    control_port: parse_port(control)?,
                    turn_port: parse_port(turn)?,
                    data_port: parse_port(data)?,
                }))
            }
            ["de-register", name] => Ok(Self::Deregister {
                name: PlayerName::new(name),
            }),
            ["query_players"] => Ok(Self::QueryPlayers),
            ["query_games"] => Ok(Self::QueryGames),
            ["start_game", dealer, k] => Ok(Self::StartGame {
                dealer: PlayerName::new(dealer),
                k: k.parse().map_err(|_| GameError::MalformedMessage)?,
            }),
            ["end_game", session_id, requester] => Ok(Self::EndGame {
                session_id: (*session_id).to_string(),
                requester: PlayerName::new(requester),
            }),
            _ => Err(GameError::MalformedMessage),
        }
    }
}

/// Notice pushed at the head of every data channel.
pub const GAME_START_NOTICE: &str = "The game has started. You can begin playing.";

/// Sentinel closing every data channel.
pub const GAME_OVER_SENTINEL: &str = "Game over";

const NO_WINNER: &str = "No winner";

/// A data-channel message. Hands and card transfers carry comma-joined
/// card names (`"K of Spades"`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataMessage {
    /// Manager -> player: the start notice.
    GameStart,
    /// Manager -> player: the dealt hand, as a bare comma-joined list
    /// of card names right after the start notice.
    Hand(Vec<Card>),
    /// Manager -> player: the receiving player holds the turn.
    TurnSignal,
    /// Player -> manager: ask `opponent` for every card of `rank`.
    Request { opponent: PlayerName, rank: Rank },
    /// Manager -> requester: the request hit; these cards are now yours.
    Caught(Vec<Card>),
    /// Manager -> requester: the request missed; the turn has passed.
    GoFish,
    /// Manager -> opponent: `by` took these cards from your hand.
    Taken { by: PlayerName, cards: Vec<Card> },
    /// Manager -> player: a rejected or malformed request.
    Error(String),
    /// Manager -> player: the session's outcome.
    Winner(Option<PlayerName>),
    /// Manager -> player: close the channel.
    GameOver,
}

fn join_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(Card::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_cards(s: &str) -> Result<Vec<Card>, GameError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(str::parse).collect()
}

impl fmt::Display for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::GameStart => write!(f, "{GAME_START_NOTICE}"),
            Self::Hand(cards) => write!(f, "{}", join_cards(cards)),
            Self::TurnSignal => write!(f, "Your turn"),
            Self::Request { opponent, rank } => write!(f, "request {opponent} {rank}"),
            Self::Caught(cards) => write!(f, "caught {}", join_cards(cards)),
            Self::GoFish => write!(f, "gofish"),
            Self::Taken { by, cards } => write!(f, "taken {by} {}", join_cards(cards)),
            Self::Error(reason) => write!(f, "error: {reason}"),
            Self::Winner(Some(name)) => write!(f, "The winner is {name}"),
            Self::Winner(None) => write!(f, "The winner is {NO_WINNER}"),
            Self::GameOver => write!(f, "{GAME_OVER_SENTINEL}"),
        }
    }
}

impl FromStr for DataMessage {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GAME_START_NOTICE => return Ok(Self::GameStart),
            GAME_OVER_SENTINEL => return Ok(Self::GameOver),
            "Your turn" => return Ok(Self::TurnSignal),
            "gofish" => return Ok(Self::GoFish),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("request ") {
            let (opponent, rank) = rest
                .rsplit_once(' ')
                .ok_or(GameError::MalformedMessage)?;
            if opponent.is_empty() || opponent.contains(' ') {
                return Err(GameError::MalformedMessage);
            }
            return Ok(Self::Request {
                opponent: PlayerName::new(opponent),
                rank: rank.parse()?,
            });
        }
        if let Some(rest) = s.strip_prefix("caught ") {
            return Ok(Self::Caught(parse_cards(rest)?));
        }
        if let Some(rest) = s.strip_prefix("taken ") {
            let (by, cards) = rest.split_once(' ').ok_or(GameError::MalformedMessage)?;
            return Ok(Self::Taken {
                by: PlayerName::new(by),
                cards: parse_cards(cards)?,
            });
        }
        if let Some(reason) = s.strip_prefix("error: ") {
            return Ok(Self::Error(reason.to_string()));
        }
        if let Some(name) = s.strip_prefix("The winner is ") {
            return Ok(match name {
                NO_WINNER => Self::Winner(None),
                name => Self::Winner(Some(PlayerName::new(name))),
            });
        }
        // Anything else that reads as a comma-joined card list is a
        // dealt hand (the hand line carries no keyword on the wire).
        parse_cards(s).map(Self::Hand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit;

    #[test]
    fn register_request_roundtrip() {
        let req: ControlRequest = "register alice 127.0.0.1 5000 5001 5002".parse().unwrap();
        match &req {
            ControlRequest::Register(record) => {
                assert_eq!(record.name, PlayerName::new("alice"));
                assert_eq!(record.address, "127.0.0.1");
                assert_eq!(record.data_port, 5002);
            }
            _ => panic!("expected a register request"),
        }
        assert_eq!(req.to_string(), "register alice 127.0.0.1 5000 5001 5002");
    }

    #[test]
    fn register_with_wrong_arity_is_malformed() {
        assert!("register alice 127.0.0.1 5000".parse::<ControlRequest>().is_err());
        assert!(
            "register alice 127.0.0.1 x y z"
                .parse::<ControlRequest>()
                .is_err()
        );
    }

    #[test]
    fn unknown_command_is_malformed() {
        assert_eq!(
            "dance".parse::<ControlRequest>().unwrap_err(),
            GameError::MalformedMessage
        );
        assert!("".parse::<ControlRequest>().is_err());
    }

    #[test]
    fn lifecycle_commands_parse() {
        assert_eq!(
            "de-register bob".parse::<ControlRequest>().unwrap(),
            ControlRequest::Deregister {
                name: PlayerName::new("bob")
            }
        );
        assert_eq!(
            "query_players".parse::<ControlRequest>().unwrap(),
            ControlRequest::QueryPlayers
        );
        assert_eq!(
            "start_game alice 2".parse::<ControlRequest>().unwrap(),
            ControlRequest::StartGame {
                dealer: PlayerName::new("alice"),
                k: 2
            }
        );
        assert_eq!(
            "end_game abc123 alice".parse::<ControlRequest>().unwrap(),
            ControlRequest::EndGame {
                session_id: "abc123".to_string(),
                requester: PlayerName::new("alice")
            }
        );
    }

    #[test]
    fn hand_message_roundtrip() {
        let cards = vec![
            Card::new(Rank::Ten, Suit::Hearts),
            Card::new(Rank::King, Suit::Spades),
        ];
        let msg = DataMessage::Hand(cards.clone());
        assert_eq!(msg.to_string(), "10 of Hearts,K of Spades");
        assert_eq!(msg.to_string().parse::<DataMessage>().unwrap(), msg);
        // An empty line is an empty hand (every dealt card booked).
        assert_eq!("".parse::<DataMessage>().unwrap(), DataMessage::Hand(Vec::new()));
    }

    #[test]
    fn request_message_roundtrip() {
        let msg = DataMessage::Request {
            opponent: PlayerName::new("bob"),
            rank: Rank::Ten,
        };
        assert_eq!(msg.to_string(), "request bob 10");
        assert_eq!("request bob 10".parse::<DataMessage>().unwrap(), msg);
        assert!("request bob".parse::<DataMessage>().is_err());
        assert!("request bob 11".parse::<DataMessage>().is_err());
    }

    #[test]
    fn sentinels_parse_to_their_variants() {
        assert_eq!(
            GAME_START_NOTICE.parse::<DataMessage>().unwrap(),
            DataMessage::GameStart
        );
        assert_eq!(
            "Game over".parse::<DataMessage>().unwrap(),
            DataMessage::GameOver
        );
        assert_eq!(
            "Your turn".parse::<DataMessage>().unwrap(),
            DataMessage::TurnSignal
        );
        assert_eq!("gofish".parse::<DataMessage>().unwrap(), DataMessage::GoFish);
    }

    #[test]
    fn taken_message_roundtrip() {
        let msg = DataMessage::Taken {
            by: PlayerName::new("alice"),
            cards: vec![Card::new(Rank::Queen, Suit::Clubs)],
        };
        assert_eq!(msg.to_string(), "taken alice Q of Clubs");
        assert_eq!(msg.to_string().parse::<DataMessage>().unwrap(), msg);
    }

    #[test]
    fn winner_messages_roundtrip() {
        let msg = DataMessage::Winner(Some(PlayerName::new("alice")));
        assert_eq!(msg.to_string(), "The winner is alice");
        assert_eq!(msg.to_string().parse::<DataMessage>().unwrap(), msg);

        let msg = DataMessage::Winner(None);
        assert_eq!(msg.to_string(), "The winner is No winner");
        assert_eq!(msg.to_string().parse::<DataMessage>().unwrap(), msg);
    }

    #[test]
    fn error_message_roundtrip() {
        let msg = DataMessage::Error("not your turn".to_string());
        assert_eq!(msg.to_string(), "error: not your turn");
        assert_eq!(msg.to_string().parse::<DataMessage>().unwrap(), msg);
    }

    #[test]
    fn garbage_line_is_malformed() {
        assert_eq!(
            "open sesame".parse::<DataMessage>().unwrap_err(),
            GameError::MalformedMessage
        );
        assert!("K of Spades,garbage".parse::<DataMessage>().is_err());
    }
}
