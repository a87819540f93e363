//! Rewind Rollback Buffer - Ring buffer of full dynamic-body snapshots
//!
//! Rollback needs to reset the physics registry to the state it had at an
//! earlier frame. This crate stores that history as a bounded ring: one
//! `FrameSnapshot` per frame, each a fixed-capacity array of per-body
//! kinematic states, overwritten in place after `window` frames.
//!
//! # Features
//!
//! - **Bounded memory**: ring of `window` frames, no growth after construction
//! - **O(bodies) capture**: one pass over the registry per frame
//! - **Stable handles**: restore writes state back by `BodyHandle`, never
//!   through live references that a restore would invalidate
//! - **Tombstone slots**: `valid = false` entries let the body set grow and
//!   shrink without reallocating the ring
//!
//! # Example
//!
//! ```rust,ignore
//! use rewind_rollback_buffer::SnapshotStore;
//!
//! // 20 frames of history, up to 16 dynamic bodies
//! let mut snapshots = SnapshotStore::new(20, 16);
//!
//! // Each tick, before applying that frame's inputs:
//! snapshots.capture(frame, &world);
//!
//! // On rollback:
//! snapshots.restore(divergence_frame, &mut world);
//! ```

use rewind_core::{BodyHandle, BodyState, Frame, Simulation};

/// One dynamic body's recorded state within a frame snapshot
///
/// `valid = false` marks a slot with no body behind it at that frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodySnapshot {
    pub handle: BodyHandle,
    pub valid: bool,
    pub state: BodyState,
}

/// All tracked dynamic bodies at one frame
#[derive(Debug, Clone)]
struct FrameSnapshot {
    /// Frame this slot was last written for
    frame: Frame,
    /// Fixed-capacity body array; valid entries form a prefix
    bodies: Vec<BodySnapshot>,
}

/// Ring buffer of per-frame simulation snapshots
///
/// A snapshot tagged `f` records the state at *entry* to frame `f`, before
/// that frame's inputs were applied. Restoring `f` and re-simulating
/// `[f, current)` therefore reproduces the original trajectory exactly, as
/// long as the step function is deterministic and `f` is within `window`
/// frames of the present.
#[derive(Debug)]
pub struct SnapshotStore {
    frames: Vec<FrameSnapshot>,
}

impl SnapshotStore {
    /// Create a store holding `window` frames of up to `body_capacity` bodies
    ///
    /// `window` bounds both memory and the maximum tolerable confirmation
    /// lag; it must match the rollback window used by the input rings.
    pub fn new(window: usize, body_capacity: usize) -> Self {
        assert!(window > 0, "Snapshot window must be greater than 0");
        Self {
            frames: (0..window)
                .map(|_| FrameSnapshot {
                    frame: -1,
                    bodies: vec![BodySnapshot::default(); body_capacity],
                })
                .collect(),
        }
    }

    /// Number of frames of history retained
    pub fn window(&self) -> usize {
        self.frames.len()
    }

    /// Maximum number of bodies per snapshot
    pub fn body_capacity(&self) -> usize {
        self.frames[0].bodies.len()
    }

    fn index(&self, frame: Frame) -> usize {
        frame.rem_euclid(self.frames.len() as Frame) as usize
    }

    /// Record every tracked dynamic body's state into `ring[frame % window]`
    ///
    /// Bodies beyond the fixed capacity are dropped from the snapshot with
    /// an error log; restoring such a frame leaves the overflowed bodies
    /// wherever the replay puts them.
    pub fn capture(&mut self, frame: Frame, sim: &impl Simulation) {
        let index = self.index(frame);
        let snapshot = &mut self.frames[index];
        snapshot.frame = frame;
        for body in &mut snapshot.bodies {
            body.valid = false;
        }

        let capacity = snapshot.bodies.len();
        let mut cursor = 0usize;
        let mut overflowed = false;
        sim.visit_bodies(&mut |handle, state| {
            if cursor >= capacity {
                overflowed = true;
                return;
            }
            let body = &mut snapshot.bodies[cursor];
            body.valid = true;
            body.handle = handle;
            body.state = *state;
            cursor += 1;
        });

        if overflowed {
            log::error!(
                "More bodies than the snapshot supports (capacity: {}), capture truncated at frame {}",
                capacity,
                frame
            );
        }
    }

    /// Reset the simulation's dynamic bodies to their state at `frame`
    ///
    /// If the slot was already overwritten by a later frame this is a
    /// correctness hazard: it is logged and the restore proceeds with
    /// whatever is present, on the assumption that callers never rewind
    /// further than `window` frames. Bodies recorded in the snapshot but
    /// since removed are skipped; bodies added after the snapshot are left
    /// as-is.
    pub fn restore(&self, frame: Frame, sim: &mut impl Simulation) {
        let snapshot = &self.frames[self.index(frame)];
        if snapshot.frame != frame {
            log::warn!(
                "Restoring frame {} from a slot tagged {}, snapshot was overwritten; restoring anyway",
                frame,
                snapshot.frame
            );
        }

        for body in snapshot.bodies.iter().filter(|body| body.valid) {
            if !sim.apply_body(body.handle, &body.state) {
                log::debug!("Snapshot body {} no longer exists, skipping", body.handle);
            }
        }
    }

    /// Occupancy statistics for diagnostics
    pub fn stats(&self) -> SnapshotStats {
        let written = self.frames.iter().filter(|s| s.frame >= 0);
        SnapshotStats {
            window: self.frames.len(),
            body_capacity: self.body_capacity(),
            oldest_frame: written.clone().map(|s| s.frame).min().unwrap_or(-1),
            newest_frame: written.map(|s| s.frame).max().unwrap_or(-1),
        }
    }
}

/// Statistics about the snapshot ring
#[derive(Debug, Clone, Copy)]
pub struct SnapshotStats {
    /// Frames of history retained
    pub window: usize,
    /// Bodies per snapshot
    pub body_capacity: usize,
    /// Oldest frame tag present, -1 when nothing was captured yet
    pub oldest_frame: Frame,
    /// Newest frame tag present, -1 when nothing was captured yet
    pub newest_frame: Frame,
}
