//! Client and room configuration
//!
//! Both configs are plain serde structs loadable from RON. The two values
//! that must agree between every client and the server are the static
//! delay and the rollback window: together they size the input rings
//! (`static_delay + rollback_window` slots) and the snapshot ring
//! (`rollback_window` frames).

use crate::{Error, Result};
use glam::Vec2;
use rewind_core::Frame;
use serde::{Deserialize, Serialize};

/// Default artificial input lag, in frames
///
/// Chosen so that at 60fps a round trip of up to ~50ms completes before a
/// client's own input is consumed, making it authoritative on arrival.
const DEFAULT_STATIC_DELAY: Frame = 3;

/// Default rollback window, in frames
const DEFAULT_ROLLBACK_WINDOW: Frame = 17;

/// Client-side session configuration
///
/// # Example
///
/// ```
/// use rewind_room::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.input_window(), 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Frames of artificial input lag applied to the local player
    pub static_delay: Frame,
    /// Frames of input and snapshot history retained for rollback
    pub rollback_window: Frame,
    /// Maximum dynamic bodies per frame snapshot
    pub body_capacity: usize,
}

impl ClientConfig {
    /// Create a validated configuration
    ///
    /// The delay is clamped to be non-negative and the window to at least
    /// one frame.
    pub fn new(static_delay: Frame, rollback_window: Frame) -> Self {
        Self {
            static_delay: static_delay.max(0),
            rollback_window: rollback_window.max(1),
            body_capacity: 16,
        }
    }

    /// Input ring capacity: the delay plus the rollback window
    pub fn input_window(&self) -> usize {
        (self.static_delay + self.rollback_window) as usize
    }

    /// Load a configuration from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATIC_DELAY, DEFAULT_ROLLBACK_WINDOW)
    }
}

/// Server-side room configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Frames of artificial input lag; must match the clients
    pub static_delay: Frame,
    /// Rollback window in frames; must match the clients
    pub rollback_window: Frame,
    /// Environment name replicated to clients
    pub env: String,
    /// Countdown broadcast with the start command, in milliseconds
    pub start_in_ms: u64,
    /// Spawn positions assigned to players in join order, cycling
    pub spawn_positions: Vec<Vec2>,
}

impl RoomConfig {
    /// Create a validated configuration
    pub fn new(static_delay: Frame, rollback_window: Frame) -> Self {
        Self {
            static_delay: static_delay.max(0),
            rollback_window: rollback_window.max(1),
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            static_delay: DEFAULT_STATIC_DELAY,
            rollback_window: DEFAULT_ROLLBACK_WINDOW,
            env: "default".to_string(),
            start_in_ms: 3000,
            spawn_positions: vec![
                Vec2::new(1.0, 1.0),
                Vec2::new(3.0, 1.0),
                Vec2::new(5.0, 1.0),
                Vec2::new(7.0, 1.0),
            ],
        }
    }

    /// Input ring capacity: the delay plus the rollback window
    pub fn input_window(&self) -> usize {
        (self.static_delay + self.rollback_window) as usize
    }

    /// Load a configuration from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_agree_on_the_window() {
        let client = ClientConfig::default();
        let room = RoomConfig::default();
        assert_eq!(client.input_window(), room.input_window());
        assert_eq!(client.static_delay, room.static_delay);
    }

    #[test]
    fn test_new_clamps_degenerate_values() {
        let config = ClientConfig::new(-2, 0);
        assert_eq!(config.static_delay, 0);
        assert_eq!(config.rollback_window, 1);
    }

    #[test]
    fn test_from_ron_partial() {
        let config = ClientConfig::from_ron("(rollback_window: 30)").unwrap();
        assert_eq!(config.rollback_window, 30);
        assert_eq!(config.static_delay, 3);

        assert!(ClientConfig::from_ron("(rollback_window: \"no\")").is_err());
    }

    #[test]
    fn test_room_from_ron() {
        let config = RoomConfig::from_ron("(env: \"cavern\", start_in_ms: 500)").unwrap();
        assert_eq!(config.env, "cavern");
        assert_eq!(config.start_in_ms, 500);
        assert_eq!(config.rollback_window, 17);
    }
}
