//! Explicit state replication contract
//!
//! The replicated room state is a fixed, ordered field list rather than
//! anything reflection-driven: `frame`, then `env`, then the per-player
//! authoritative input histories in join order. `diff` and `apply` are
//! pure functions over that list; a patch produced against one base is
//! only meaningful when applied to that same base.

use indexmap::IndexMap;
use rewind_core::{Frame, Input, PlayerId};
use serde::{Deserialize, Serialize};

/// The ordered contents of one player's authoritative input ring
///
/// Slot `i` holds the most recent input whose frame satisfied
/// `frame % len == i`, mirroring `InputRingBuffer`'s layout so the two can
/// be copied into each other index for index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputHistory {
    pub inputs: Vec<Input>,
}

impl InputHistory {
    /// A zero-filled history of `window` slots
    pub fn new(window: usize) -> Self {
        Self {
            inputs: vec![Input::default(); window],
        }
    }
}

/// The replicated room state: frame counter, environment name, and every
/// player's authoritative input history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub frame: Frame,
    pub env: String,
    pub players: IndexMap<PlayerId, InputHistory>,
}

/// Changes to one player's replicated input history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPatch {
    pub id: PlayerId,
    /// Full history for a player the base does not know yet
    pub full: Option<InputHistory>,
    /// Changed ring slots, as `(slot index, new input)`
    pub slots: Vec<(u32, Input)>,
}

/// A pure delta between two room states
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomStatePatch {
    pub frame: Option<Frame>,
    pub env: Option<String>,
    pub players: Vec<PlayerPatch>,
    pub removed: Vec<PlayerId>,
}

impl RoomStatePatch {
    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.frame.is_none()
            && self.env.is_none()
            && self.players.is_empty()
            && self.removed.is_empty()
    }
}

/// Compute the patch that turns `old` into `new`
pub fn diff(old: &RoomState, new: &RoomState) -> RoomStatePatch {
    let mut patch = RoomStatePatch::default();

    if old.frame != new.frame {
        patch.frame = Some(new.frame);
    }
    if old.env != new.env {
        patch.env = Some(new.env.clone());
    }

    for (id, history) in &new.players {
        match old.players.get(id) {
            None => patch.players.push(PlayerPatch {
                id: id.clone(),
                full: Some(history.clone()),
                slots: Vec::new(),
            }),
            Some(base) => {
                let slots: Vec<(u32, Input)> = history
                    .inputs
                    .iter()
                    .enumerate()
                    .filter(|(index, input)| base.inputs.get(*index) != Some(*input))
                    .map(|(index, input)| (index as u32, *input))
                    .collect();
                if !slots.is_empty() {
                    patch.players.push(PlayerPatch {
                        id: id.clone(),
                        full: None,
                        slots,
                    });
                }
            }
        }
    }

    patch.removed = old
        .players
        .keys()
        .filter(|id| !new.players.contains_key(*id))
        .cloned()
        .collect();

    patch
}

/// Apply a patch produced by `diff` to the base it was diffed against
///
/// Slot indices outside the base history are ignored: they can only occur
/// when a patch is applied to a base it was not produced for.
pub fn apply(base: &RoomState, patch: &RoomStatePatch) -> RoomState {
    let mut state = base.clone();

    if let Some(frame) = patch.frame {
        state.frame = frame;
    }
    if let Some(env) = &patch.env {
        state.env = env.clone();
    }

    for id in &patch.removed {
        state.players.shift_remove(id);
    }

    for player in &patch.players {
        if let Some(full) = &player.full {
            state.players.insert(player.id.clone(), full.clone());
            continue;
        }
        if let Some(history) = state.players.get_mut(&player.id) {
            for (index, input) in &player.slots {
                if let Some(slot) = history.inputs.get_mut(*index as usize) {
                    *slot = *input;
                }
            }
        }
    }

    state
}
