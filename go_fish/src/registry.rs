//! The player registry: name to endpoint mapping, insertion-ordered.
//!
//! Registration order matters because it becomes the turn order of a
//! session created while these players are registered. The busy check
//! for de-registration lives in the manager, where the session is
//! visible; here a removal only fails when the name is unknown.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::{entities::PlayerName, session::GameError};

/// A registered player's endpoint and capability ports.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub name: PlayerName,
    pub address: String,
    pub control_port: u16,
    pub turn_port: u16,
    pub data_port: u16,
}

impl fmt::Display for PlayerRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({}/{}/{})",
            self.name, self.address, self.control_port, self.turn_port, self.data_port
        )
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<PlayerRecord>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, failing with `DuplicateName` if the name is
    /// taken. A failed insert leaves the registry unchanged.
    pub fn register(&mut self, record: PlayerRecord) -> Result<(), GameError> {
        if self.records.iter().any(|r| r.name == record.name) {
            return Err(GameError::DuplicateName);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn deregister(&mut self, name: &PlayerName) -> Result<(), GameError> {
        let idx = self
            .records
            .iter()
            .position(|r| &r.name == name)
            .ok_or(GameError::PlayerNotFound)?;
        self.records.remove(idx);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &PlayerName) -> Option<&PlayerRecord> {
        self.records.iter().find(|r| &r.name == name)
    }

    /// Returns `(count, snapshot)` of the current records. The snapshot
    /// is a clone, so callers never observe a torn read.
    #[must_use]
    pub fn query(&self) -> (usize, Vec<PlayerRecord>) {
        (self.records.len(), self.records.clone())
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<PlayerName> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
