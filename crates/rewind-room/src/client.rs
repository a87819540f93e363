//! The client-side frame loop
//!
//! A `ClientSession` renders a locally predicted future: it simulates the
//! current frame before the server has confirmed anyone's inputs, using
//! the reconciler's resolution policy, and snapshots every frame so that
//! a later divergence can rewind the world and replay it under corrected
//! inputs.
//!
//! Tick order is load-bearing (spec of the protocol, not a preference):
//! a pending rollback is executed first, before the new frame is
//! simulated, and once `should_rollback` reports true the very next tick
//! must perform it; there is no cancelling an in-flight rollback.

use crate::{ClientConfig, Error, Result};
use rewind_core::{Frame, Input, PlayerId, PlayerRegistry, RawInput, Simulation};
use rewind_netcode::{apply, Message, PlayerSpawn, Reconciler, RoomState, RoomStatePatch};
use rewind_rollback_buffer::SnapshotStore;

/// A predictive client bound to one room
///
/// Owns the reconciler, the snapshot history, and the simulation; consumes
/// decoded server messages and queues outgoing ones. The caller drives
/// `tick` at the fixed timestep (see `TickScheduler`) and moves the
/// message queues.
pub struct ClientSession<S> {
    local_id: PlayerId,
    config: ClientConfig,
    reconciler: Reconciler,
    snapshots: SnapshotStore,
    sim: S,
    /// Players in join order; the simulation steps them in this order
    players: Vec<PlayerId>,
    /// Local replica of the replicated room state, the diff base
    replica: RoomState,
    current_frame: Frame,
    started: bool,
    is_owner: bool,
    rollbacks_performed: u64,
    outbox: Vec<Message>,
}

impl<S: Simulation + PlayerRegistry> ClientSession<S> {
    /// Create a session for the local player over a fresh simulation
    pub fn new(local_id: PlayerId, config: ClientConfig, sim: S) -> Self {
        let reconciler = Reconciler::new(local_id.clone(), config.input_window());
        let snapshots = SnapshotStore::new(config.rollback_window as usize, config.body_capacity);
        Self {
            local_id,
            config,
            reconciler,
            snapshots,
            sim,
            players: Vec::new(),
            replica: RoomState::default(),
            current_frame: 1,
            started: false,
            is_owner: false,
            rollbacks_performed: 0,
            outbox: Vec::new(),
        }
    }

    /// The local player's id
    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    /// The frame the next `tick` will simulate
    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// Whether the game has started
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the server reported this client as the room owner
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// How many rollbacks this session has executed
    pub fn rollbacks_performed(&self) -> u64 {
        self.rollbacks_performed
    }

    /// The simulation, for rendering and inspection
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// Snapshot ring occupancy, for diagnostics
    pub fn snapshot_stats(&self) -> rewind_rollback_buffer::SnapshotStats {
        self.snapshots.stats()
    }

    /// Messages queued for the server since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    /// Queue an ownership query
    pub fn check_ownership(&mut self) {
        self.outbox.push(Message::CheckOwnership {
            client: self.local_id.clone(),
        });
    }

    /// Queue the owner-only start command
    pub fn request_start(&mut self) {
        self.outbox.push(Message::StartGame {
            client: self.local_id.clone(),
        });
    }

    /// Process one decoded server message
    ///
    /// Every inbound message for a wall-clock interval must be handled
    /// before the next `tick`, or the rollback decision is made on stale
    /// information.
    pub fn handle_message(&mut self, message: Message) -> Result<()> {
        match message {
            // RTT estimation is an external collaborator; the probe reply
            // carries no protocol state.
            Message::Pong => Ok(()),
            Message::OwnershipStatus { is_owner } => {
                self.is_owner = is_owner;
                Ok(())
            }
            Message::GameStarting { players, .. } => self.start(players),
            Message::State(patch) => self.apply_state(patch),
            other => {
                log::debug!("Ignoring server-bound message on the client: {:?}", other);
                Ok(())
            }
        }
    }

    /// Advance one fixed-timestep frame
    ///
    /// `controls` is the local input captured for this tick. It is stored
    /// as a prediction `static_delay` frames ahead and sent to the server
    /// under the undelayed frame number.
    pub fn tick(&mut self, controls: RawInput) -> Result<()> {
        if !self.started {
            return Err(Error::NotStarted);
        }

        if self.reconciler.should_rollback() {
            self.rollback()?;
        }

        let delayed_frame = self.current_frame + self.config.static_delay;
        self.reconciler
            .set_own_input(delayed_frame, Input::new(delayed_frame, controls))?;
        self.outbox
            .push(Message::Input(Input::new(self.current_frame, controls)));

        self.simulate_frame(self.current_frame)?;
        self.current_frame += 1;
        Ok(())
    }

    /// Rewind to the divergence frame and replay under corrected inputs
    fn rollback(&mut self) -> Result<()> {
        let from_frame = self.reconciler.rollback_from_frame();
        log::debug!(
            "[{}] Rolling back from frame {} to {}",
            self.local_id,
            self.current_frame,
            from_frame
        );

        self.snapshots.restore(from_frame, &mut self.sim);
        for frame in from_frame..self.current_frame {
            self.simulate_frame(frame)?;
        }

        self.reconciler.rollback_performed();
        self.rollbacks_performed += 1;
        Ok(())
    }

    /// Snapshot the frame-entry state, then consume inputs and step
    fn simulate_frame(&mut self, frame: Frame) -> Result<()> {
        self.snapshots.capture(frame, &self.sim);
        for id in &self.players {
            let input = self.reconciler.get_input(frame, id)?;
            self.sim.apply_input(id, &input);
        }
        self.sim.step();
        Ok(())
    }

    /// Spawn every player and arm the frame loop
    fn start(&mut self, spawns: Vec<PlayerSpawn>) -> Result<()> {
        if self.started {
            log::debug!("[{}] Duplicate start message ignored", self.local_id);
            return Ok(());
        }

        for spawn in spawns {
            self.reconciler.add_player(spawn.id.clone())?;
            self.sim.spawn_player(&spawn.id, spawn.position);
            self.players.push(spawn.id);
        }
        self.started = true;
        Ok(())
    }

    /// Apply a replicated state delta and feed new authoritative inputs
    /// into the reconciler
    fn apply_state(&mut self, patch: RoomStatePatch) -> Result<()> {
        let next = apply(&self.replica, &patch);

        for id in &patch.removed {
            if self.reconciler.contains_player(id) {
                self.reconciler.remove_player(id)?;
                self.sim.despawn_player(id);
                self.players.retain(|player| player != id);
            }
        }

        // Collect changed slots and sort them by frame: ring order is
        // arbitrary, and confirming a newer frame first would make the
        // reconciler reject the older one as stale.
        let mut confirmations: Vec<(Frame, PlayerId, Input)> = Vec::new();
        for player in &patch.players {
            if !self.reconciler.contains_player(&player.id) {
                continue;
            }
            let threshold = self
                .reconciler
                .last_authoritative_frame(&player.id)
                .unwrap_or(0);

            if let Some(full) = &player.full {
                confirmations.extend(
                    full.inputs
                        .iter()
                        .filter(|input| input.frame > threshold)
                        .map(|input| (input.frame, player.id.clone(), *input)),
                );
            } else {
                confirmations.extend(
                    player
                        .slots
                        .iter()
                        .filter(|(_, input)| input.frame > threshold)
                        .map(|(_, input)| (input.frame, player.id.clone(), *input)),
                );
            }
        }
        confirmations.sort_by_key(|(frame, ..)| *frame);

        for (frame, id, input) in confirmations {
            self.reconciler.confirm_input(frame, &id, input)?;
        }

        self.replica = next;
        Ok(())
    }
}
