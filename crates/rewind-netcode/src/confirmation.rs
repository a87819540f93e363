//! Server-side input confirmation tracking
//!
//! The server advances its authoritative timeline only through frames for
//! which every player's input is known. This module tracks the
//! last-confirmed frame per player, derives the room-wide confirmed frame
//! as the minimum across players, and enforces the rollback-window bound
//! with forced confirmation: a stalled client is dragged forward so the
//! room keeps moving, at the cost of stale input over the forced span.

use crate::{Error, Result};
use indexmap::IndexMap;
use rewind_core::{Frame, PlayerId};

/// Confirmation bookkeeping for one player
#[derive(Debug)]
struct PlayerRecord {
    /// Highest frame with a confirmed input, monotonic
    last_confirmed_frame: Frame,
}

/// A player whose confirmed frame was forcibly advanced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedConfirmation {
    pub player: PlayerId,
    /// The player's confirmed frame before it was forced; the caller
    /// replicates the input stored there forward over the skipped span.
    pub from_frame: Frame,
}

/// Tracks which frames are fully confirmed across a room's players
#[derive(Debug)]
pub struct ConfirmationTracker {
    /// Frame new players are seeded at (the room's start frame)
    start_frame: Frame,
    /// Rollback window in frames; how far any player may lag the room
    window: Frame,
    players: IndexMap<PlayerId, PlayerRecord>,
    /// Minimum of `last_confirmed_frame` over all active players
    global_confirmed: Frame,
}

impl ConfirmationTracker {
    /// Create a tracker for a room starting at `start_frame` with a
    /// rollback window of `window` frames
    pub fn new(start_frame: Frame, window: Frame) -> Self {
        assert!(window > 0, "Rollback window must be greater than 0");
        Self {
            start_frame,
            window,
            players: IndexMap::new(),
            global_confirmed: start_frame,
        }
    }

    /// The room's start frame
    pub fn start_frame(&self) -> Frame {
        self.start_frame
    }

    /// The rollback window in frames
    pub fn window(&self) -> Frame {
        self.window
    }

    /// Minimum confirmed frame across all active players
    pub fn global_confirmed_frame(&self) -> Frame {
        self.global_confirmed
    }

    /// Number of tracked players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Seed a record for a joining player at the room's start frame
    pub fn add_player(&mut self, id: PlayerId) -> Result<()> {
        if self.players.contains_key(&id) {
            return Err(Error::PlayerExists(id));
        }
        self.players.insert(
            id,
            PlayerRecord {
                last_confirmed_frame: self.start_frame,
            },
        );
        self.recompute_global();
        Ok(())
    }

    /// Remove a leaving player and recompute the room minimum
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<()> {
        self.players
            .shift_remove(id)
            .ok_or_else(|| Error::UnknownPlayer(id.clone()))?;
        self.recompute_global();
        Ok(())
    }

    /// Confirm a player's input for `frame`
    ///
    /// Only strictly increasing frames are accepted per player; anything
    /// else is logged and rejected so callers know not to store the
    /// corresponding payload. Acceptance recomputes the room minimum.
    pub fn confirm_input(&mut self, id: &PlayerId, frame: Frame) -> Result<bool> {
        let record = self
            .players
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPlayer(id.clone()))?;

        if record.last_confirmed_frame >= frame {
            log::warn!(
                "[{}] Cannot confirm same or older input (current: {}, received: {})",
                id,
                record.last_confirmed_frame,
                frame
            );
            return Ok(false);
        }

        record.last_confirmed_frame = frame;
        self.recompute_global();
        Ok(true)
    }

    /// Drag lagging players forward when the room minimum falls more than
    /// the rollback window behind `current_frame`
    ///
    /// Fires only when `current_frame - global_confirmed_frame > window`,
    /// which means some player's unconfirmed frames are about to be
    /// overwritten in the bounded input rings. Every player below
    /// `current_frame - window` is forced up to exactly that frame and
    /// reported together with its prior confirmed frame, so the caller can
    /// replicate the last known input across the skipped span. Returns
    /// `None` when nothing had to be forced.
    pub fn try_force_confirmation(
        &mut self,
        current_frame: Frame,
    ) -> Option<Vec<ForcedConfirmation>> {
        let floor = current_frame - self.window;
        if self.global_confirmed >= floor {
            return None;
        }

        let mut forced = Vec::new();
        for (id, record) in &mut self.players {
            if record.last_confirmed_frame < floor {
                log::warn!(
                    "[{}] Forcing confirmation from frame {} to {}",
                    id,
                    record.last_confirmed_frame,
                    floor
                );
                forced.push(ForcedConfirmation {
                    player: id.clone(),
                    from_frame: record.last_confirmed_frame,
                });
                record.last_confirmed_frame = floor;
            }
        }
        self.recompute_global();

        if forced.is_empty() {
            None
        } else {
            Some(forced)
        }
    }

    fn recompute_global(&mut self) {
        if let Some(min) = self
            .players
            .values()
            .map(|record| record.last_confirmed_frame)
            .min()
        {
            self.global_confirmed = min;
        }
    }
}
