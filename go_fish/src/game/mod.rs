//! Go Fish game core - cards, hands, and the session state machine.

pub mod constants;
pub mod entities;
pub mod session;
