//! A blocking UDP control-channel client.
//!
//! One datagram per request, one per response. Used by the player
//! binary and as a testing utility; there is no automatic retry -
//! any retry policy belongs to the caller.

use anyhow::{Context, Error, bail};
use std::{
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

use super::messages::ControlRequest;
use crate::game::entities::PlayerName;
use crate::registry::PlayerRecord;

/// Default timeout for waiting on a manager response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_DATAGRAM: usize = 64 * 1024;

/// A started game, parsed from a successful `start_game` response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StartedGame {
    pub session_id: String,
    pub participants: Vec<PlayerName>,
}

pub struct ControlClient {
    socket: UdpSocket,
    manager: SocketAddr,
}

impl ControlClient {
    /// Binds an ephemeral local socket aimed at the manager's control
    /// address.
    pub fn connect(manager: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("couldn't bind a control socket")?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(Self { socket, manager })
    }

    /// Sends one request and waits for the matching response.
    pub fn send(&self, request: &ControlRequest) -> Result<String, Error> {
        self.socket
            .send_to(request.to_string().as_bytes(), self.manager)
            .with_context(|| format!("couldn't reach the manager at {}", self.manager))?;
        let mut buf = [0; MAX_DATAGRAM];
        let (n, _) = self
            .socket
            .recv_from(&mut buf)
            .with_context(|| format!("no response from the manager at {}", self.manager))?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    pub fn register(&self, record: &PlayerRecord) -> Result<(), Error> {
        let response = self.send(&ControlRequest::Register(record.clone()))?;
        if response != "SUCCESS" {
            bail!("registration rejected: {response}");
        }
        Ok(())
    }

    pub fn deregister(&self, name: &PlayerName) -> Result<(), Error> {
        let response = self.send(&ControlRequest::Deregister { name: name.clone() })?;
        if response != "SUCCESS" {
            bail!("de-registration rejected: {response}");
        }
        Ok(())
    }

    /// Raw `(count, [records])` snapshot text.
    pub fn query_players(&self) -> Result<String, Error> {
        self.send(&ControlRequest::QueryPlayers)
    }

    /// Raw `(count, [sessions])` snapshot text.
    pub fn query_games(&self) -> Result<String, Error> {
        self.send(&ControlRequest::QueryGames)
    }

    pub fn start_game(&self, dealer: &PlayerName, k: usize) -> Result<StartedGame, Error> {
        let response = self.send(&ControlRequest::StartGame {
            dealer: dealer.clone(),
            k,
        })?;
        let mut parts = response.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("SUCCESS"), Some(session_id)) => Ok(StartedGame {
                session_id: session_id.to_string(),
                participants: parts.map(PlayerName::new).collect(),
            }),
            _ => bail!("game did not start: {response}"),
        }
    }

    pub fn end_game(&self, session_id: &str, requester: &PlayerName) -> Result<String, Error> {
        let response = self.send(&ControlRequest::EndGame {
            session_id: session_id.to_string(),
            requester: requester.clone(),
        })?;
        if !response.starts_with("SUCCESS") {
            bail!("couldn't end the game: {response}");
        }
        Ok(response)
    }
}
