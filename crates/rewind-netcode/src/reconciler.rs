//! Client-side input reconciliation
//!
//! Decides, per frame and per player, which input source the simulation
//! should trust, and detects when an earlier prediction turns out to have
//! been wrong.
//!
//! Possible cases for one player's input at frame `X`:
//!
//! 1. The authoritative input arrives before the simulation consumes `X`:
//!    `get_input` returns it directly, nothing to reconcile.
//! 2. The simulation consumes `X` first. `get_input` returns a prediction
//!    (the player's own buffered input, or the last known authoritative
//!    input held forward for a remote player) and records it. When the
//!    authoritative input later arrives:
//!    2.1. it equals the prediction: the prediction is marked confirmed;
//!    2.2. it differs: a rollback is requested starting from the earliest
//!         frame any player's prediction could be wrong.

use crate::{Error, Result};
use indexmap::IndexMap;
use rewind_core::{Frame, Input, InputRingBuffer, PlayerId};

/// Prediction bookkeeping for one player
#[derive(Debug)]
struct PlayerInputState {
    /// Inputs the simulation used (or will use) before confirmation
    predicted: InputRingBuffer,
    /// Server-confirmed inputs, ground truth once present
    authoritative: InputRingBuffer,
    /// Highest frame with an authoritative input, monotonic
    last_authoritative_frame: Frame,
    /// Highest predicted frame reconciled against authority
    last_confirmed_prediction: Frame,
    /// Highest frame the simulation actually consumed for this player
    last_used_frame: Frame,
}

impl PlayerInputState {
    fn new(window: usize) -> rewind_core::Result<Self> {
        Ok(Self {
            predicted: InputRingBuffer::new(window)?,
            authoritative: InputRingBuffer::new(window)?,
            last_authoritative_frame: 0,
            last_confirmed_prediction: 0,
            last_used_frame: 0,
        })
    }
}

/// One-shot rollback command, at most one pending per room
///
/// A second divergence while one is pending is absorbed: confirmed
/// prediction frames only advance, so `from_frame` is always the earliest
/// known divergence point already.
#[derive(Debug, Default)]
struct RollbackRequest {
    pending: bool,
    from_frame: Frame,
}

/// Outcome of the per-player branch of `confirm_input`
enum Confirm {
    Stale,
    Reconciled,
    Diverged,
}

/// Client-side prediction and reconciliation manager
///
/// Owns one predicted and one authoritative input ring per known player,
/// resolves each frame's input from the most trustworthy source, and turns
/// prediction/authority divergence into a deferred rollback request that
/// the frame loop executes.
#[derive(Debug)]
pub struct Reconciler {
    own_id: PlayerId,
    /// Ring capacity: static delay plus the rollback window
    window: usize,
    players: IndexMap<PlayerId, PlayerInputState>,
    rollback: RollbackRequest,
    /// Highest frame for which every player's authoritative input is known
    last_complete_frame: Frame,
}

impl Reconciler {
    /// Create a reconciler for the local player
    ///
    /// `window` is the ring capacity in frames; it must cover the static
    /// delay plus the rollback window so that no frame inside a replay has
    /// been overwritten.
    pub fn new(own_id: PlayerId, window: usize) -> Self {
        Self {
            own_id,
            window,
            players: IndexMap::new(),
            rollback: RollbackRequest::default(),
            last_complete_frame: -1,
        }
    }

    /// The local player's id
    pub fn own_id(&self) -> &PlayerId {
        &self.own_id
    }

    /// Number of tracked players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether `player` is currently tracked
    pub fn contains_player(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    /// Highest frame with an authoritative input for `player`
    pub fn last_authoritative_frame(&self, player: &PlayerId) -> Option<Frame> {
        self.players
            .get(player)
            .map(|state| state.last_authoritative_frame)
    }

    /// Highest frame for which every player's authoritative input is known
    pub fn last_complete_frame(&self) -> Frame {
        self.last_complete_frame
    }

    /// Start tracking a player
    pub fn add_player(&mut self, id: PlayerId) -> Result<()> {
        if self.players.contains_key(&id) {
            return Err(Error::PlayerExists(id));
        }
        let state = PlayerInputState::new(self.window)?;
        self.players.insert(id, state);
        Ok(())
    }

    /// Stop tracking a player
    ///
    /// A pending rollback request stays pending; the complete-frame floor
    /// is recomputed over the survivors so the request is not stranded
    /// below a frame the departed player would never have confirmed.
    pub fn remove_player(&mut self, id: &PlayerId) -> Result<()> {
        self.players
            .shift_remove(id)
            .ok_or_else(|| Error::UnknownPlayer(id.clone()))?;
        self.refresh_last_complete_frame();
        Ok(())
    }

    /// Buffer the local player's input for a future frame
    ///
    /// Always called with `frame = simulation_frame + static_delay`: the
    /// artificial input lag is chosen to usually exceed one round trip, so
    /// the input is authoritative by the time the simulation consumes it.
    pub fn set_own_input(&mut self, frame: Frame, input: Input) -> Result<()> {
        let state = self
            .players
            .get_mut(&self.own_id)
            .ok_or_else(|| Error::UnknownPlayer(self.own_id.clone()))?;
        state.predicted.set(frame, input);
        Ok(())
    }

    /// Resolve the input the simulation should use for `player` at `frame`
    ///
    /// Resolution order:
    /// 1. the authoritative input, when already known for `frame`;
    /// 2. the local player's own buffered prediction;
    /// 3. for remote players, the last known authoritative input held
    ///    forward, written into the predicted ring at `frame` so it can be
    ///    compared when the real input arrives.
    pub fn get_input(&mut self, frame: Frame, player: &PlayerId) -> Result<Input> {
        let own = *player == self.own_id;
        let state = self
            .players
            .get_mut(player)
            .ok_or_else(|| Error::UnknownPlayer(player.clone()))?;

        state.last_used_frame = frame;

        if state.last_authoritative_frame >= frame {
            Ok(state.authoritative.get(frame))
        } else if own {
            Ok(state.predicted.get(frame))
        } else {
            let held = state.authoritative.get(state.last_authoritative_frame);
            Ok(state.predicted.set(frame, held))
        }
    }

    /// Record an authoritative input for `player` at `frame`
    ///
    /// Returns `Ok(false)` when the input is stale (frame at or below the
    /// player's last authoritative frame): it is logged and dropped with no
    /// state change. Otherwise the input is stored as ground truth and
    /// reconciled against the prediction the simulation may already have
    /// consumed; a mismatch schedules a rollback from the earliest frame
    /// any player's prediction could be wrong.
    pub fn confirm_input(&mut self, frame: Frame, player: &PlayerId, input: Input) -> Result<bool> {
        let outcome = {
            let state = self
                .players
                .get_mut(player)
                .ok_or_else(|| Error::UnknownPlayer(player.clone()))?;

            if frame <= state.last_authoritative_frame {
                log::warn!(
                    "[{}] Rejecting stale input (last authoritative: {}, received: {})",
                    player,
                    state.last_authoritative_frame,
                    frame
                );
                Confirm::Stale
            } else {
                state.authoritative.set(frame, input);
                state.last_authoritative_frame = frame;

                if state.last_used_frame < frame {
                    // The simulation never consumed a prediction for this
                    // frame: stamp the authoritative value and move on.
                    state.predicted.set(frame, input);
                    state.last_confirmed_prediction = frame;
                    Confirm::Reconciled
                } else if state.last_confirmed_prediction < frame {
                    let predicted = state.predicted.get(frame);
                    if predicted.same_controls(&input) {
                        state.last_confirmed_prediction = frame;
                        Confirm::Reconciled
                    } else {
                        Confirm::Diverged
                    }
                } else {
                    log::warn!(
                        "[{}] Cannot confirm already-reconciled input (confirmed: {}, received: {})",
                        player,
                        state.last_confirmed_prediction,
                        frame
                    );
                    Confirm::Reconciled
                }
            }
        };

        if matches!(outcome, Confirm::Stale) {
            return Ok(false);
        }

        self.refresh_last_complete_frame();

        if matches!(outcome, Confirm::Diverged) {
            log::debug!(
                "[{}] Prediction diverged from authority at frame {}",
                player,
                frame
            );
            // The request must capture this player's confirmed frame as it
            // was before the correction is stamped in.
            self.schedule_rollback();
            if let Some(state) = self.players.get_mut(player) {
                state.predicted.set(frame, input);
                state.last_confirmed_prediction = frame;
            }
        }

        Ok(true)
    }

    /// Whether the frame loop must perform a rollback before simulating
    ///
    /// True only when a request is pending *and* every player's
    /// authoritative input for the replay start is known; until then the
    /// rollback is deferred so the replay cannot immediately re-diverge on
    /// still-missing remote data.
    pub fn should_rollback(&self) -> bool {
        self.rollback.pending && self.rollback.from_frame <= self.last_complete_frame
    }

    /// First frame the pending rollback must re-simulate
    pub fn rollback_from_frame(&self) -> Frame {
        self.rollback.from_frame
    }

    /// Clear the pending request after the caller executed the replay
    pub fn rollback_performed(&mut self) {
        self.rollback.pending = false;
    }

    /// Advance the room-wide complete frame to the minimum authoritative
    /// frame across players, never backwards
    fn refresh_last_complete_frame(&mut self) {
        let Some(min_authoritative) = self
            .players
            .values()
            .map(|state| state.last_authoritative_frame)
            .min()
        else {
            return;
        };

        if min_authoritative > self.last_complete_frame {
            self.last_complete_frame = min_authoritative;
        }
    }

    /// Request a rollback from the earliest frame any player's prediction
    /// could be wrong
    ///
    /// A mismatch for one player may have steered every other player's
    /// simulated trajectory, so the replay starts at the minimum confirmed
    /// prediction frame across the room, not at the divergent frame.
    fn schedule_rollback(&mut self) {
        if self.rollback.pending {
            return;
        }

        let from_frame = self
            .players
            .values()
            .map(|state| state.last_confirmed_prediction)
            .min()
            .unwrap_or(0);

        self.rollback.pending = true;
        self.rollback.from_frame = from_frame;
        log::debug!("Rollback scheduled from frame {}", from_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::RawInput;

    const WINDOW: usize = 23;

    fn player(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn press_right(frame: Frame) -> Input {
        Input::new(
            frame,
            RawInput {
                right: true,
                ..RawInput::default()
            },
        )
    }

    fn press_jump(frame: Frame) -> Input {
        Input::new(
            frame,
            RawInput {
                jump: true,
                ..RawInput::default()
            },
        )
    }

    fn two_player_reconciler() -> Reconciler {
        let mut reconciler = Reconciler::new(player("a"), WINDOW);
        reconciler.add_player(player("a")).unwrap();
        reconciler.add_player(player("b")).unwrap();
        reconciler
    }

    #[test]
    fn test_add_remove_player() {
        let mut reconciler = two_player_reconciler();
        assert_eq!(reconciler.player_count(), 2);
        assert!(reconciler.add_player(player("a")).is_err());

        reconciler.remove_player(&player("b")).unwrap();
        assert!(!reconciler.contains_player(&player("b")));
        assert!(reconciler.remove_player(&player("b")).is_err());
    }

    #[test]
    fn test_own_input_is_predicted_until_confirmed() {
        let mut reconciler = two_player_reconciler();

        reconciler.set_own_input(4, press_right(4)).unwrap();
        let resolved = reconciler.get_input(4, &player("a")).unwrap();
        assert!(resolved.right);
        assert_eq!(resolved.frame, 4);
    }

    #[test]
    fn test_authoritative_input_wins_when_known() {
        let mut reconciler = two_player_reconciler();

        reconciler.set_own_input(1, press_right(1)).unwrap();
        reconciler
            .confirm_input(1, &player("a"), press_jump(1))
            .unwrap();

        let resolved = reconciler.get_input(1, &player("a")).unwrap();
        assert!(resolved.jump);
        assert!(!resolved.right);
    }

    #[test]
    fn test_remote_player_extrapolates_last_authoritative() {
        let mut reconciler = two_player_reconciler();

        reconciler
            .confirm_input(1, &player("b"), press_right(1))
            .unwrap();

        // Frame 3 has no authority for b yet: hold frame 1's input forward.
        let resolved = reconciler.get_input(3, &player("b")).unwrap();
        assert!(resolved.right);
        assert_eq!(resolved.frame, 3);
    }

    #[test]
    fn test_stale_input_rejected_without_state_change() {
        let mut reconciler = two_player_reconciler();

        assert!(reconciler
            .confirm_input(5, &player("b"), press_right(5))
            .unwrap());
        assert!(!reconciler
            .confirm_input(5, &player("b"), press_jump(5))
            .unwrap());
        assert!(!reconciler
            .confirm_input(3, &player("b"), press_jump(3))
            .unwrap());

        // The original confirmation survives the duplicates.
        assert_eq!(reconciler.last_authoritative_frame(&player("b")), Some(5));
        let resolved = reconciler.get_input(5, &player("b")).unwrap();
        assert!(resolved.right);
        assert!(!resolved.jump);
    }

    #[test]
    fn test_confirmation_before_usage_needs_no_rollback() {
        let mut reconciler = two_player_reconciler();

        // Input arrives before the simulation asked for it.
        reconciler
            .confirm_input(2, &player("b"), press_right(2))
            .unwrap();
        assert!(!reconciler.should_rollback());

        let resolved = reconciler.get_input(2, &player("b")).unwrap();
        assert!(resolved.right);
        assert!(!reconciler.should_rollback());
    }

    #[test]
    fn test_matching_confirmation_after_usage_needs_no_rollback() {
        let mut reconciler = two_player_reconciler();

        reconciler.set_own_input(1, press_right(1)).unwrap();
        reconciler.get_input(1, &player("a")).unwrap();
        reconciler.get_input(1, &player("b")).unwrap();

        reconciler
            .confirm_input(1, &player("a"), press_right(1))
            .unwrap();
        reconciler
            .confirm_input(1, &player("b"), Input::default())
            .unwrap();

        assert!(!reconciler.should_rollback());
    }

    #[test]
    fn test_divergence_schedules_rollback() {
        let mut reconciler = two_player_reconciler();

        // The simulation consumed extrapolated (empty) inputs for b.
        reconciler.get_input(1, &player("a")).unwrap();
        reconciler.get_input(1, &player("b")).unwrap();

        reconciler
            .confirm_input(1, &player("a"), Input::default())
            .unwrap();
        reconciler
            .confirm_input(1, &player("b"), press_jump(1))
            .unwrap();

        assert!(reconciler.should_rollback());
        assert_eq!(reconciler.rollback_from_frame(), 0);

        reconciler.rollback_performed();
        assert!(!reconciler.should_rollback());
    }

    #[test]
    fn test_second_divergence_is_absorbed() {
        let mut reconciler = two_player_reconciler();

        for frame in 1..=3 {
            reconciler.get_input(frame, &player("a")).unwrap();
            reconciler.get_input(frame, &player("b")).unwrap();
        }
        for frame in 1..=3 {
            reconciler
                .confirm_input(frame, &player("a"), Input::default())
                .unwrap();
        }

        // b diverges at frame 2, then again at frame 3 while the first
        // request is still pending.
        reconciler
            .confirm_input(1, &player("b"), Input::default())
            .unwrap();
        reconciler
            .confirm_input(2, &player("b"), press_jump(2))
            .unwrap();
        let from = reconciler.rollback_from_frame();
        reconciler
            .confirm_input(3, &player("b"), press_right(3))
            .unwrap();

        assert!(reconciler.should_rollback());
        assert_eq!(reconciler.rollback_from_frame(), from);
    }

    #[test]
    fn test_rollback_starts_at_minimum_confirmed_prediction() {
        // Spec scenario: a's inputs match the echo exactly, b's frame 5
        // differs from the extrapolated prediction.
        let mut reconciler = two_player_reconciler();

        for frame in 1..=10 {
            reconciler
                .set_own_input(frame, press_right(frame))
                .unwrap();
            reconciler.get_input(frame, &player("a")).unwrap();
            reconciler.get_input(frame, &player("b")).unwrap();
        }

        for frame in 1..=10 {
            assert!(reconciler
                .confirm_input(frame, &player("a"), press_right(frame))
                .unwrap());
        }
        assert!(!reconciler.should_rollback());

        // b's frames 1..4 match the held-forward (empty) prediction.
        for frame in 1..=4 {
            reconciler
                .confirm_input(frame, &player("b"), Input::default())
                .unwrap();
        }
        reconciler
            .confirm_input(5, &player("b"), press_jump(5))
            .unwrap();

        // The replay starts at the minimum confirmed prediction across the
        // room (a: 10, b: 4), not at b's divergent frame in isolation.
        assert!(reconciler.should_rollback());
        assert_eq!(reconciler.rollback_from_frame(), 4);
    }

    #[test]
    fn test_rollback_deferred_until_frame_complete() {
        let mut reconciler = two_player_reconciler();

        for frame in 1..=5 {
            reconciler.get_input(frame, &player("a")).unwrap();
            reconciler.get_input(frame, &player("b")).unwrap();
        }

        reconciler
            .confirm_input(1, &player("a"), press_jump(1))
            .unwrap();

        // Divergence for a is known, and frame 0 is complete for everyone
        // (no player has authority above it, none is missing below it).
        assert!(reconciler.should_rollback());
        assert!(reconciler.rollback_from_frame() <= reconciler.last_complete_frame());
    }

    #[test]
    fn test_remove_player_unblocks_complete_frame() {
        let mut reconciler = two_player_reconciler();
        reconciler.add_player(player("c")).unwrap();

        reconciler
            .confirm_input(3, &player("a"), Input::default())
            .unwrap();
        reconciler
            .confirm_input(3, &player("b"), Input::default())
            .unwrap();

        // c never confirmed anything and holds the complete frame at 0.
        assert_eq!(reconciler.last_complete_frame(), 0);

        reconciler.remove_player(&player("c")).unwrap();
        assert_eq!(reconciler.last_complete_frame(), 3);
    }
}
