//! Per-frame control inputs and the fixed-capacity input ring
//!
//! Inputs are tiny `Copy` records (five control flags plus the frame they
//! belong to). Both sides of the protocol store them in `InputRingBuffer`,
//! a circular store indexed by `frame mod capacity` with an O(1), no-branch
//! read contract: `get` never validates the slot tag, so callers must keep
//! lookups within `capacity` frames of the relevant write.

use crate::time::Frame;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// The five control flags as captured from the input device
///
/// This is the on-wire shape of a client's intent for one frame; the frame
/// tag is attached separately (`Input::new`) because the client sends the
/// undelayed frame while both sides store under the delayed one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// A player's control intent for a single simulation frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// The frame this input applies to
    pub frame: Frame,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl Input {
    /// Tag raw control flags with the frame they apply to
    pub fn new(frame: Frame, raw: RawInput) -> Self {
        Self {
            frame,
            up: raw.up,
            down: raw.down,
            left: raw.left,
            right: raw.right,
            jump: raw.jump,
        }
    }

    /// Get the control flags without the frame tag
    pub fn raw(&self) -> RawInput {
        RawInput {
            up: self.up,
            down: self.down,
            left: self.left,
            right: self.right,
            jump: self.jump,
        }
    }

    /// Compare the five control flags, ignoring the frame tags
    ///
    /// Comparing inputs tagged with different frames is only meaningful
    /// when the caller already knows it is intentional, so a mismatch is
    /// logged as a warning rather than failing the comparison.
    pub fn same_controls(&self, other: &Input) -> bool {
        if self.frame != other.frame {
            log::warn!(
                "Comparing inputs from different frames (current: {}, other: {})",
                self.frame,
                other.frame
            );
        }

        self.up == other.up
            && self.down == other.down
            && self.left == other.left
            && self.right == other.right
            && self.jump == other.jump
    }
}

/// Fixed-capacity circular store of inputs, indexed by `frame mod capacity`
///
/// Invariant: `slots[f % capacity]` holds the most recently written input
/// whose frame was congruent to `f`; writing frame `f + capacity` after
/// `f` silently overwrites it with no detection. Staleness is a caller-side
/// invariant, not a runtime check: `get` is deliberately branch-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRingBuffer {
    slots: Vec<Input>,
}

impl InputRingBuffer {
    /// Create a ring with the given capacity, zero-filled
    ///
    /// Capacity is typically `static_delay + rollback_window`: enough slots
    /// that no frame inside the replay window has been overwritten.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(Self {
            slots: vec![Input::default(); capacity],
        })
    }

    /// Number of slots in the ring
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, frame: Frame) -> usize {
        frame.rem_euclid(self.slots.len() as Frame) as usize
    }

    /// Write `input` at `frame`, tagging the slot with `frame`
    ///
    /// Returns the stored copy so callers can keep mutating it downstream.
    pub fn set(&mut self, frame: Frame, input: Input) -> Input {
        let index = self.index(frame);
        let slot = &mut self.slots[index];
        *slot = input;
        slot.frame = frame;
        *slot
    }

    /// Read the slot for `frame` without validating its tag
    ///
    /// Callers are responsible for bounding lookups within `capacity`
    /// frames of the last relevant write; a lookup outside that bound
    /// returns whatever frame currently aliases the slot.
    pub fn get(&self, frame: Frame) -> Input {
        self.slots[self.index(frame)]
    }

    /// The raw slot array, in ring order
    ///
    /// Slot `i` holds the most recent write whose frame satisfied
    /// `frame % capacity == i`. Replication copies this array verbatim.
    pub fn slots(&self) -> &[Input] {
        &self.slots
    }

    /// Replicate the input stored at `from` into every slot in `(from, to]`
    ///
    /// Each filled slot is re-tagged with its own frame. Used by the server
    /// to fill frames skipped by a forced confirmation with the player's
    /// last known input.
    pub fn copy_forward(&mut self, from: Frame, to: Frame) {
        let source = self.get(from);
        for frame in (from + 1)..=to {
            self.set(frame, source);
        }
    }
}
