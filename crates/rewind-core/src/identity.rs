//! Identity types for players and simulation bodies

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a player within a room
///
/// Session ids arrive from the transport as opaque strings, so this is a
/// string newtype rather than a numeric handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create a new player ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Stable handle to a dynamic body in the simulation
///
/// Handles are arena indices owned by the room side. They stay valid
/// across snapshot restores; live references into the physics registry
/// must never be held across a restore boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

impl BodyHandle {
    /// Create a new body handle
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw arena index
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id() {
        let id = PlayerId::new("p1");
        assert_eq!(id.as_str(), "p1");
        assert_eq!(format!("{}", id), "p1");
    }

    #[test]
    fn test_body_handle() {
        let handle = BodyHandle::new(7);
        assert_eq!(handle.index(), 7);
        assert_eq!(format!("{}", handle), "body:7");
    }
}
