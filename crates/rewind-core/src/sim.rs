//! The simulation boundary: body state and the deterministic step contract
//!
//! The physics engine itself is an external collaborator. Rollback only
//! needs four things from it, captured by the `Simulation` trait: apply a
//! player's input, advance one fixed step, enumerate dynamic bodies, and
//! write a body's kinematic state back by stable handle.

use crate::identity::{BodyHandle, PlayerId};
use crate::input::Input;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Full kinematic state of one dynamic body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec2,
    pub rotation: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

/// Spawn bookkeeping for player-controlled bodies
///
/// Kept separate from `Simulation` so the rollback machinery, which never
/// creates or destroys bodies, depends only on the step contract.
pub trait PlayerRegistry {
    /// Create a body for a joining player at `position`
    fn spawn_player(&mut self, id: &PlayerId, position: Vec2);

    /// Remove a leaving player's body; its handle must never be reused
    fn despawn_player(&mut self, id: &PlayerId);
}

/// An opaque, deterministic fixed-step simulation over a body registry
///
/// Determinism contract: given identical starting state and identical
/// ordered inputs, `step` produces identical results. This is assumed, not
/// verified, and it is the prerequisite for rollback correctness. Bodies are
/// addressed by stable `BodyHandle`s that survive a state restore; a
/// handle resolves to "the same body" before and after `apply_body`.
pub trait Simulation {
    /// Apply one player's control input for the current frame
    fn apply_input(&mut self, player: &PlayerId, input: &Input);

    /// Advance the simulation by one fixed timestep
    fn step(&mut self);

    /// Visit every tracked dynamic body in a stable order
    fn visit_bodies(&self, visit: &mut dyn FnMut(BodyHandle, &BodyState));

    /// Write a body's kinematic state back by handle
    ///
    /// Returns `false` when the handle no longer resolves (the body was
    /// removed after the state was recorded); the caller decides whether
    /// that is worth logging.
    fn apply_body(&mut self, handle: BodyHandle, state: &BodyState) -> bool;
}
