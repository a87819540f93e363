//! Rewind Sim - Deterministic reference world
//!
//! A minimal 2D world implementing the `Simulation` trait: dynamic boxes
//! under gravity on a flat floor, driven by per-frame control inputs. It
//! exists so the rollback machinery can be exercised and its determinism
//! properties tested end to end; it is a stand-in for a real physics
//! engine, not one.
//!
//! Coordinates follow the usual 2D physics convention of this codebase:
//! positive `y` points down, so gravity is `(0, +20)` and a jump force
//! points toward negative `y`.
//!
//! Bodies live in an arena of tombstoned slots: a `BodyHandle` is a stable
//! index that keeps resolving to the same body across snapshot restores,
//! and removal never shifts other handles.

use glam::Vec2;
use indexmap::IndexMap;
use rewind_core::{BodyHandle, BodyState, Input, PlayerId, PlayerRegistry, Simulation};

/// Gravity applied to every dynamic body, in units per second squared
const GRAVITY: Vec2 = Vec2::new(0.0, 20.0);

/// Scale from a unit input direction to an applied force
const FORCE_MULTIPLIER: f32 = 20.0;

/// Horizontal speed cap, applied when an input is received
const MAX_HORIZONTAL_SPEED: f32 = 2.0;

/// Fixed timestep, 60 simulation frames per second
const TIMESTEP: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy)]
struct Body {
    state: BodyState,
    half_extents: Vec2,
    /// Force accumulated since the last step
    force: Vec2,
}

/// A deterministic world of dynamic boxes over a flat floor
#[derive(Debug)]
pub struct PlatformWorld {
    /// Arena of body slots; `None` is a tombstone for a removed body
    bodies: Vec<Option<Body>>,
    players: IndexMap<PlayerId, BodyHandle>,
    /// The floor's `y` coordinate (remember: positive `y` is down)
    floor_y: f32,
}

impl PlatformWorld {
    /// Create an empty world with the floor at `floor_y`
    pub fn new(floor_y: f32) -> Self {
        Self {
            bodies: Vec::new(),
            players: IndexMap::new(),
            floor_y,
        }
    }

    /// Add a free dynamic body and return its stable handle
    pub fn add_body(&mut self, position: Vec2, half_extents: Vec2) -> BodyHandle {
        let handle = BodyHandle::new(self.bodies.len() as u32);
        self.bodies.push(Some(Body {
            state: BodyState {
                position,
                ..BodyState::default()
            },
            half_extents,
            force: Vec2::ZERO,
        }));
        handle
    }

    /// Add a player-controlled body
    pub fn add_player(&mut self, id: PlayerId, position: Vec2) -> BodyHandle {
        let handle = self.add_body(position, Vec2::new(0.25, 0.25));
        self.players.insert(id, handle);
        handle
    }

    /// Remove a player and tombstone their body slot
    ///
    /// Other handles are unaffected; snapshots referencing the removed
    /// body simply stop resolving.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<BodyHandle> {
        let handle = self.players.shift_remove(id)?;
        self.bodies[handle.index() as usize] = None;
        Some(handle)
    }

    /// The handle of a player's body
    pub fn player_handle(&self, id: &PlayerId) -> Option<BodyHandle> {
        self.players.get(id).copied()
    }

    /// A body's current kinematic state
    pub fn body_state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies
            .get(handle.index() as usize)?
            .as_ref()
            .map(|body| body.state)
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    fn input_to_force(input: &Input) -> Vec2 {
        let mut direction = Vec2::ZERO;
        if input.left {
            direction.x -= 1.0;
        }
        if input.right {
            direction.x += 1.0;
        }
        if input.jump {
            // TODO check grounded before allowing jump
            direction.y -= 1.0;
        }
        direction * FORCE_MULTIPLIER
    }
}

impl PlayerRegistry for PlatformWorld {
    fn spawn_player(&mut self, id: &PlayerId, position: Vec2) {
        self.add_player(id.clone(), position);
    }

    fn despawn_player(&mut self, id: &PlayerId) {
        self.remove_player(id);
    }
}

impl Simulation for PlatformWorld {
    fn apply_input(&mut self, player: &PlayerId, input: &Input) {
        let Some(handle) = self.players.get(player) else {
            return;
        };
        let Some(body) = &mut self.bodies[handle.index() as usize] else {
            return;
        };

        let velocity = &mut body.state.linear_velocity;
        velocity.x = velocity.x.clamp(-MAX_HORIZONTAL_SPEED, MAX_HORIZONTAL_SPEED);
        body.force += Self::input_to_force(input);
    }

    fn step(&mut self) {
        for body in self.bodies.iter_mut().flatten() {
            let state = &mut body.state;
            state.linear_velocity += (GRAVITY + body.force) * TIMESTEP;
            state.position += state.linear_velocity * TIMESTEP;
            state.rotation += state.angular_velocity * TIMESTEP;
            body.force = Vec2::ZERO;

            // Floor contact: clamp and kill downward motion.
            let bottom = state.position.y + body.half_extents.y;
            if bottom > self.floor_y {
                state.position.y = self.floor_y - body.half_extents.y;
                if state.linear_velocity.y > 0.0 {
                    state.linear_velocity.y = 0.0;
                }
            }
        }
    }

    fn visit_bodies(&self, visit: &mut dyn FnMut(BodyHandle, &BodyState)) {
        for (index, body) in self.bodies.iter().enumerate() {
            if let Some(body) = body {
                visit(BodyHandle::new(index as u32), &body.state);
            }
        }
    }

    fn apply_body(&mut self, handle: BodyHandle, state: &BodyState) -> bool {
        match self.bodies.get_mut(handle.index() as usize) {
            Some(Some(body)) => {
                body.state = *state;
                true
            }
            _ => false,
        }
    }
}
