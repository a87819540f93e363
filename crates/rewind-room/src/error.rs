//! Error types for rewind-room

use rewind_core::PlayerId;
use thiserror::Error;

/// Room error type
#[derive(Debug, Error)]
pub enum Error {
    /// The game has not started; the frame loop is not running yet
    #[error("The game has not started")]
    NotStarted,

    /// The game already started; late joins are not supported
    #[error("The game already started")]
    AlreadyStarted,

    /// A start command from a player who does not own the room
    #[error("Player {0} is not the room owner")]
    NotOwner(PlayerId),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol-level failure
    #[error(transparent)]
    Netcode(#[from] rewind_netcode::Error),

    /// Core-type failure
    #[error(transparent)]
    Core(#[from] rewind_core::Error),
}

/// Result type for room operations
pub type Result<T> = std::result::Result<T, Error>;
