//! Error types for rewind-netcode

use rewind_core::PlayerId;
use thiserror::Error;

/// Netcode error type
///
/// Recoverable protocol conditions (stale input, snapshot overwrite) are
/// not errors: they are logged and absorbed where they occur. These
/// variants cover caller mistakes and boundary failures.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation referenced a player that was never added (or already removed)
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A player with this id already exists in the room
    #[error("Player {0} already exists")]
    PlayerExists(PlayerId),

    /// Wire encode/decode failure at the transport boundary
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Ring construction failed
    #[error(transparent)]
    Core(#[from] rewind_core::Error),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
