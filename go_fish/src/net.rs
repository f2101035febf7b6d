//! Networking components for the coordination protocol.

/// Blocking UDP control-channel client.
pub mod client;

/// Textual control and data-channel message vocabulary.
pub mod messages;

/// The manager's event loop.
pub mod server;

/// Line codec shared by both channel directions.
pub mod utils;
