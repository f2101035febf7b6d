//! Sequential port allocation from a configured inclusive range.

use crate::game::session::GameError;

/// Hands out ports one at a time from `[start, end]`. Exhaustion is a
/// reported failure, never a wrap-around.
#[derive(Debug)]
pub struct PortAllocator {
    next: u32,
    end: u32,
}

impl PortAllocator {
    #[must_use]
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            next: u32::from(start),
            end: u32::from(end),
        }
    }

    pub fn next_port(&mut self) -> Result<u16, GameError> {
        if self.next > self.end {
            return Err(GameError::NoPortsAvailable);
        }
        let port = self.next as u16;
        self.next += 1;
        Ok(port)
    }
}
