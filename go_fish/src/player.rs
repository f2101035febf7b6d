//! The player peer: registration, the data-channel session loop, and
//! clean de-registration.
//!
//! Move input is an external collaborator behind [`MoveSource`]; this
//! module only coordinates. Data-channel reads are blocking with no
//! timeout, matching the base protocol.

use anyhow::{Context, Error, bail};
use log::{info, warn};
use std::{
    io::BufReader,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
};

use crate::game::entities::{Hand, PlayerName, Rank};
use crate::net::{
    client::{ControlClient, StartedGame},
    messages::DataMessage,
    utils,
};
use crate::registry::PlayerRecord;

/// A move decision from the operator (or a bot).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlayerMove {
    /// Ask `opponent` for every card of `rank`.
    Ask { opponent: PlayerName, rank: Rank },
    /// End the session (dealer only; the manager enforces it).
    EndGame,
    /// Walk away mid-game. The manager degrades the session.
    Quit,
}

/// Supplies moves whenever this peer holds the turn.
pub trait MoveSource {
    fn next_move(&mut self, hand: &Hand, books: &[Rank]) -> PlayerMove;
}

pub struct PlayerPeer {
    record: PlayerRecord,
    control: ControlClient,
    listener: TcpListener,
    hand: Hand,
    books: Vec<Rank>,
}

impl PlayerPeer {
    /// Binds the advertised data port and aims a control client at the
    /// manager. The listener must exist before registration so a deal
    /// arriving right after `register` finds someone to connect to.
    pub fn new(record: PlayerRecord, manager: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind((record.address.as_str(), record.data_port))
            .with_context(|| {
                format!(
                    "couldn't bind the data port {}:{}",
                    record.address, record.data_port
                )
            })?;
        let control = ControlClient::connect(manager)?;
        Ok(Self {
            record,
            control,
            listener,
            hand: Hand::default(),
            books: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &PlayerName {
        &self.record.name
    }

    #[must_use]
    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    #[must_use]
    pub fn books(&self) -> &[Rank] {
        &self.books
    }

    #[must_use]
    pub fn control(&self) -> &ControlClient {
        &self.control
    }

    /// Registers with the manager. No automatic retry: a rejection is
    /// reported to the caller as-is.
    pub fn register(&self) -> Result<(), Error> {
        self.control.register(&self.record)
    }

    /// Asks the manager to start a game with at least `k` players.
    pub fn request_start(&self, k: usize) -> Result<StartedGame, Error> {
        self.control.start_game(&self.record.name, k)
    }

    /// De-registers on shutdown. Failure (for example, still being a
    /// session participant) is surfaced to the operator, not swallowed.
    pub fn deregister(&self) -> Result<(), Error> {
        self.control.deregister(&self.record.name)
    }

    /// Accepts the manager's data connection and runs the session to
    /// the `Game over` sentinel. Returns the books collected.
    pub fn play<M: MoveSource>(
        &mut self,
        session_id: Option<&str>,
        moves: &mut M,
    ) -> Result<Vec<Rank>, Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .context("no data channel from the manager")?;
        info!("data channel established with the manager at {peer}");
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        loop {
            let line = utils::read_line(&mut reader).context("data channel lost")?;
            let msg = match line.parse::<DataMessage>() {
                Ok(msg) => msg,
                Err(_) => {
                    warn!("ignoring unrecognized data message: {line:?}");
                    continue;
                }
            };
            match msg {
                DataMessage::GameStart => {
                    // A new session starts from a clean slate; nothing
                    // carries over from an earlier game.
                    self.hand = Hand::default();
                    self.books.clear();
                    info!("the game has started");
                }
                DataMessage::Hand(cards) => {
                    self.hand = Hand::from(cards);
                    self.collect_books();
                    info!("received a hand of {} cards", self.hand.len());
                }
                DataMessage::TurnSignal => {
                    if !self.take_turn(session_id, moves, &mut writer)? {
                        break;
                    }
                }
                DataMessage::Caught(cards) => {
                    info!("caught {} card(s)", cards.len());
                    self.hand.add(cards);
                    self.collect_books();
                }
                DataMessage::GoFish => info!("go fish; the turn passes"),
                DataMessage::Taken { by, cards } => {
                    info!("{by} took {} card(s) from your hand", cards.len());
                    self.hand.remove_exact(&cards);
                }
                DataMessage::Error(reason) => warn!("the manager rejected a move: {reason}"),
                DataMessage::Winner(Some(name)) => info!("the winner is {name}"),
                DataMessage::Winner(None) => info!("the game ended with no winner"),
                DataMessage::GameOver => {
                    info!("game over");
                    break;
                }
                DataMessage::Request { .. } => {
                    warn!("ignoring a request addressed to the manager");
                }
            }
        }
        Ok(self.books.clone())
    }

    /// Handles one turn signal. Returns false when the operator quits.
    fn take_turn<M: MoveSource>(
        &mut self,
        session_id: Option<&str>,
        moves: &mut M,
        writer: &mut TcpStream,
    ) -> Result<bool, Error> {
        loop {
            match moves.next_move(&self.hand, &self.books) {
                PlayerMove::Ask { opponent, rank } => {
                    utils::write_line(writer, &DataMessage::Request { opponent, rank })?;
                    return Ok(true);
                }
                PlayerMove::EndGame => {
                    let Some(session_id) = session_id else {
                        warn!("only the dealer of this session can end it");
                        continue;
                    };
                    match self.control.end_game(session_id, &self.record.name) {
                        // The winner broadcast and sentinel follow on
                        // the data channel.
                        Ok(response) => {
                            info!("{response}");
                            return Ok(true);
                        }
                        Err(error) => {
                            warn!("{error}");
                            continue;
                        }
                    }
                }
                PlayerMove::Quit => {
                    warn!("leaving the game mid-session");
                    return Ok(false);
                }
            }
        }
    }

    fn collect_books(&mut self) {
        let new_books = self.hand.extract_books();
        for rank in &new_books {
            info!("completed a book of {rank}s");
        }
        self.books.extend(new_books);
    }
}

/// Resolves a `host:port` string into a socket address.
pub fn resolve(addr: &str) -> Result<SocketAddr, Error> {
    let resolved = addr
        .to_socket_addrs()
        .with_context(|| format!("couldn't resolve {addr}"))?
        .next();
    match resolved {
        Some(addr) => Ok(addr),
        None => bail!("couldn't resolve {addr}"),
    }
}
