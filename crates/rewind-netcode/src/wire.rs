//! Wire messages
//!
//! The closed set of messages crossing the client/server boundary, one
//! variant per message name, with fixed field schemas resolved here at the
//! transport boundary. The transport itself (sockets, channels, whatever)
//! is external; it only ever sees the encoded bytes.

use crate::replication::RoomStatePatch;
use crate::{Error, Result};
use glam::Vec2;
use rewind_core::{Input, PlayerId};
use serde::{Deserialize, Serialize};

/// A player's spawn assignment, broadcast when the game starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSpawn {
    pub id: PlayerId,
    pub position: Vec2,
}

/// Every message exchanged between client and server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client to server: the local input for an (undelayed) frame
    Input(Input),
    /// Client to server: RTT probe
    Ping,
    /// Server to client: RTT probe reply
    Pong,
    /// Client to server: am I the room owner?
    CheckOwnership { client: PlayerId },
    /// Server to client: ownership reply
    OwnershipStatus { is_owner: bool },
    /// Client to server: owner-only command to start the game
    StartGame { client: PlayerId },
    /// Server to all clients: the game starts in `start_in_ms`
    GameStarting {
        start_in_ms: u64,
        players: Vec<PlayerSpawn>,
    },
    /// Server to all clients: replicated room state delta
    State(RoomStatePatch),
}

/// Encode a message for the transport
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    bincode::serialize(message).map_err(|err| Error::Serialization(err.to_string()))
}

/// Decode a message received from the transport
pub fn decode(bytes: &[u8]) -> Result<Message> {
    bincode::deserialize(bytes).map_err(|err| Error::Serialization(err.to_string()))
}
