//! The manager's event loop.
//!
//! One thread owns the `Manager` and every socket: the UDP control
//! socket plus one TCP data connection per dealt player. Each control
//! datagram is dispatched start-to-finish before the next is read, so
//! registry and session mutations never interleave. Network pushes
//! (the deal, turn results, the end-of-game broadcast) run after
//! dispatch returns, outside any state mutation.
//!
//! Outbound data-channel messages go through a per-connection write
//! buffer: a short write or `WouldBlock` leaves the remainder queued
//! and the connection watched for writability, so turn signals are
//! never lost to a momentarily full socket.

use anyhow::Error;
use log::{info, warn};
use mio::{
    Events, Interest, Poll, Token,
    net::{TcpStream, UdpSocket},
};
use std::{
    collections::HashMap,
    io::{self, Read, Write},
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use super::{messages::DataMessage, utils};
use crate::game::{
    entities::{Card, PlayerName},
    session::{GameError, TurnOutcome},
};
use crate::manager::{DealPlan, Effect, Manager};
use crate::registry::PlayerRecord;

const CONTROL: Token = Token(0);
const MAX_DATAGRAM: usize = 2048;

/// Manager-side tunables.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Timeout for establishing a data channel during a deal.
    pub connect_timeout: Duration,
    /// Timeout for the blocking deal push on a fresh data channel.
    pub write_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
        }
    }
}

struct DataConn {
    name: PlayerName,
    stream: TcpStream,
    buf: Vec<u8>,
    out: Vec<u8>,
}

impl DataConn {
    fn queue(&mut self, msg: &DataMessage) {
        self.out.extend_from_slice(msg.to_string().as_bytes());
        self.out.push(b'\n');
    }

    /// Writes as much of the pending output as the socket accepts.
    /// Leftover bytes stay queued for the next writable event.
    fn flush(&mut self) -> io::Result<()> {
        while !self.out.is_empty() {
            match self.stream.write(&self.out) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.out.drain(..n);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn wants_write(&self) -> bool {
        !self.out.is_empty()
    }
}

/// Runs the manager until the process exits.
pub fn run(addr: SocketAddr, config: ManagerConfig) -> Result<(), Error> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(256);
    let mut control = UdpSocket::bind(addr)?;
    poll.registry()
        .register(&mut control, CONTROL, Interest::READABLE)?;
    info!("manager listening for control messages on {addr}");

    let mut manager = Manager::new();
    let mut conns: HashMap<Token, DataConn> = HashMap::new();
    let mut next_token = 1;

    loop {
        if let Err(error) = poll.poll(&mut events, None) {
            if error.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(error.into());
        }
        for event in events.iter() {
            match event.token() {
                CONTROL => drain_control(
                    &control,
                    &poll,
                    &config,
                    &mut manager,
                    &mut conns,
                    &mut next_token,
                )?,
                token => {
                    if !conns.contains_key(&token) {
                        continue;
                    }
                    let mut closed = false;
                    if event.is_writable() {
                        if let Some(conn) = conns.get_mut(&token) {
                            if let Err(error) = conn.flush() {
                                warn!("couldn't flush to {}: {error}", conn.name);
                                closed = true;
                            }
                        }
                    }
                    if event.is_readable() {
                        if let Some(conn) = conns.get_mut(&token) {
                            closed |= read_conn(conn);
                        }
                        while let Some(line) = conns
                            .get_mut(&token)
                            .and_then(|conn| utils::split_line(&mut conn.buf))
                        {
                            handle_data_line(&poll, &mut manager, &mut conns, token, &line);
                        }
                    }
                    if closed {
                        drop_conn(&poll, &mut manager, &mut conns, token);
                    } else if let Some(conn) = conns.get_mut(&token) {
                        update_interest(&poll, conn, token);
                    }
                }
            }
        }
    }
}

/// Reads every pending control datagram, dispatching each one and
/// answering its sender.
fn drain_control(
    control: &UdpSocket,
    poll: &Poll,
    config: &ManagerConfig,
    manager: &mut Manager,
    conns: &mut HashMap<Token, DataConn>,
    next_token: &mut usize,
) -> Result<(), Error> {
    let mut buf = [0; MAX_DATAGRAM];
    loop {
        let (n, peer) = match control.recv_from(&mut buf) {
            Ok(received) => received,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        let raw = String::from_utf8_lossy(&buf[..n]);
        let (response, effect) = manager.dispatch(raw.trim());
        if let Err(error) = control.send_to(response.as_bytes(), peer) {
            warn!("couldn't answer control peer {peer}: {error}");
        }
        match effect {
            Some(Effect::Deal(plan)) => {
                open_data_channels(poll, config, conns, next_token, plan);
            }
            Some(Effect::Finish { winner }) => finish_game(poll, conns, winner),
            None => {}
        }
    }
}

/// Connects to every dealt player's data port, pushes the start notice
/// and hand, and folds the connection into the poll set for turn
/// exchange. An unreachable peer is logged and skipped; hands already
/// dealt to other players are not rolled back.
fn open_data_channels(
    poll: &Poll,
    config: &ManagerConfig,
    conns: &mut HashMap<Token, DataConn>,
    next_token: &mut usize,
    plan: DealPlan,
) {
    info!("dealing hands for session {}", plan.session_id);
    for (record, cards) in &plan.hands {
        match push_deal(record, cards, config) {
            Ok(stream) => {
                let token = Token(*next_token);
                *next_token += 1;
                let mut stream = TcpStream::from_std(stream);
                if let Err(error) =
                    poll.registry().register(&mut stream, token, Interest::READABLE)
                {
                    warn!("couldn't watch the data channel to {}: {error}", record.name);
                    continue;
                }
                info!("dealt {} cards to {}", cards.len(), record.name);
                conns.insert(
                    token,
                    DataConn {
                        name: record.name.clone(),
                        stream,
                        buf: Vec::new(),
                        out: Vec::new(),
                    },
                );
            }
            Err(error) => {
                warn!("peer {} unreachable during the deal: {error}", record.name);
            }
        }
    }
    send_to_name(poll, conns, &plan.first_turn, &DataMessage::TurnSignal);
}

fn push_deal(
    record: &PlayerRecord,
    cards: &[Card],
    config: &ManagerConfig,
) -> io::Result<std::net::TcpStream> {
    let addr = (record.address.as_str(), record.data_port)
        .to_socket_addrs()?
        .next()
        .ok_or(io::ErrorKind::AddrNotAvailable)?;
    let mut stream = std::net::TcpStream::connect_timeout(&addr, config.connect_timeout)?;
    stream.set_write_timeout(Some(config.write_timeout))?;
    utils::write_line(&mut stream, &DataMessage::GameStart)?;
    utils::write_line(&mut stream, &DataMessage::Hand(cards.to_vec()))?;
    stream.set_nonblocking(true)?;
    Ok(stream)
}

/// Applies one data-channel line from the player behind `token`.
fn handle_data_line(
    poll: &Poll,
    manager: &mut Manager,
    conns: &mut HashMap<Token, DataConn>,
    token: Token,
    line: &str,
) {
    let Some(name) = conns.get(&token).map(|conn| conn.name.clone()) else {
        return;
    };
    let outcome = match line.parse::<DataMessage>() {
        Ok(DataMessage::Request { opponent, rank }) => {
            manager.handle_turn(&name, &opponent, rank)
        }
        Ok(_) | Err(_) => Err(GameError::MalformedMessage),
    };
    match outcome {
        Ok(TurnOutcome::Caught {
            opponent,
            cards,
            books,
        }) => {
            if !books.is_empty() {
                info!("{name} completed {} book(s)", books.len());
            }
            send_to(poll, conns, token, &DataMessage::Caught(cards.clone()));
            send_to_name(poll, conns, &opponent, &DataMessage::Taken { by: name, cards });
            send_to(poll, conns, token, &DataMessage::TurnSignal);
        }
        Ok(TurnOutcome::GoFish { next }) => {
            send_to(poll, conns, token, &DataMessage::GoFish);
            send_to_name(poll, conns, &next, &DataMessage::TurnSignal);
        }
        Err(error) => {
            warn!("rejected turn request {line:?} from {name}: {error}");
            send_to(poll, conns, token, &DataMessage::Error(error.to_string()));
            // Re-signal if the sender still holds the turn, so one bad
            // request cannot wedge the session.
            let holds_turn = manager
                .session()
                .and_then(|session| session.current_turn())
                .is_some_and(|current| current == &name);
            if holds_turn {
                send_to(poll, conns, token, &DataMessage::TurnSignal);
            }
        }
    }
}

/// Broadcasts the outcome and closes every data channel.
fn finish_game(poll: &Poll, conns: &mut HashMap<Token, DataConn>, winner: Option<PlayerName>) {
    match &winner {
        Some(name) => info!("game over; the winner is {name}"),
        None => info!("game over; no winner"),
    }
    for (_, mut conn) in conns.drain() {
        conn.queue(&DataMessage::Winner(winner.clone()));
        conn.queue(&DataMessage::GameOver);
        if let Err(error) = conn.flush() {
            warn!("couldn't notify {} of the game end: {error}", conn.name);
        } else if conn.wants_write() {
            warn!("closing the channel to {} with unsent data", conn.name);
        }
        if let Err(error) = poll.registry().deregister(&mut conn.stream) {
            warn!("couldn't drop the data channel to {}: {error}", conn.name);
        }
    }
}

/// Reads whatever the peer has sent. Returns true once the connection
/// is closed or broken.
fn read_conn(conn: &mut DataConn) -> bool {
    let mut chunk = [0; 4096];
    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => return true,
            Ok(n) => {
                conn.buf.extend_from_slice(&chunk[..n]);
                if conn.buf.len() > utils::MAX_LINE_LENGTH {
                    warn!("{} sent an oversized line; dropping them", conn.name);
                    return true;
                }
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return false,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                warn!("data channel error from {}: {error}", conn.name);
                return true;
            }
        }
    }
}

/// Drops a dead connection. The session degrades instead of stalling:
/// the leaver drops out of the turn rotation, and if they held the
/// turn, the next participant still present is signalled.
fn drop_conn(
    poll: &Poll,
    manager: &mut Manager,
    conns: &mut HashMap<Token, DataConn>,
    token: Token,
) {
    let Some(mut conn) = conns.remove(&token) else {
        return;
    };
    let _ = poll.registry().deregister(&mut conn.stream);
    warn!("lost the data channel to {}", conn.name);
    if let Some(next) = manager.handle_disconnect(&conn.name) {
        info!("turn passes to {next}");
        send_to_name(poll, conns, &next, &DataMessage::TurnSignal);
    }
}

/// Re-registers the connection for writability while output is queued.
fn update_interest(poll: &Poll, conn: &mut DataConn, token: Token) {
    let interest = if conn.wants_write() {
        Interest::READABLE | Interest::WRITABLE
    } else {
        Interest::READABLE
    };
    if let Err(error) = poll.registry().reregister(&mut conn.stream, token, interest) {
        warn!("couldn't watch the data channel to {}: {error}", conn.name);
    }
}

fn send_to(poll: &Poll, conns: &mut HashMap<Token, DataConn>, token: Token, msg: &DataMessage) {
    if let Some(conn) = conns.get_mut(&token) {
        conn.queue(msg);
        if let Err(error) = conn.flush() {
            warn!("couldn't push to {}: {error}", conn.name);
        }
        update_interest(poll, conn, token);
    }
}

fn send_to_name(
    poll: &Poll,
    conns: &mut HashMap<Token, DataConn>,
    name: &PlayerName,
    msg: &DataMessage,
) {
    let token = conns
        .iter()
        .find_map(|(token, conn)| (&conn.name == name).then_some(*token));
    if let Some(token) = token {
        send_to(poll, conns, token, msg);
    }
}
