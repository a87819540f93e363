//! The authoritative server room
//!
//! The server never predicts and never rolls back: its frame counter only
//! advances through frames for which every player's input is confirmed,
//! so its timeline is proof-driven rather than speculative. The price is
//! that one stalled client could freeze the room; the forced-confirmation
//! valve bounds that stall at the rollback window.

use crate::{Error, Result, RoomConfig};
use glam::Vec2;
use indexmap::IndexMap;
use rewind_core::{Frame, Input, InputRingBuffer, PlayerId, PlayerRegistry, Simulation};
use rewind_netcode::{
    diff, ConfirmationTracker, InputHistory, Message, PlayerSpawn, RoomState,
};
use std::collections::VecDeque;

/// An outgoing server message and its destination
#[derive(Debug)]
pub struct Outgoing {
    /// Target client, or `None` for a room-wide broadcast
    pub to: Option<PlayerId>,
    pub message: Message,
}

/// Server-side bookkeeping for one player
#[derive(Debug)]
struct ServerPlayer {
    /// The player's authoritative input ring, replicated to clients
    ring: InputRingBuffer,
    spawn: Vec2,
}

/// One room's authoritative loop and exclusively owned state
pub struct ServerRoom<S> {
    config: RoomConfig,
    players: IndexMap<PlayerId, ServerPlayer>,
    tracker: ConfirmationTracker,
    sim: S,
    /// Next frame to simulate; never outruns the global confirmed frame
    frame: Frame,
    /// Wall-clock tick count since the room started
    ///
    /// Unlike `frame` this advances on every tick whether or not inputs
    /// are confirmed; it is the reference the forced-confirmation valve
    /// measures lag against, because incoming inputs keep landing in the
    /// bounded rings at wall-clock pace.
    ticks: Frame,
    /// The first joiner owns the room until they leave
    owner: Option<PlayerId>,
    started: bool,
    /// Inputs received since the last tick, drained before anything else
    inbox: VecDeque<(PlayerId, Input)>,
    outbox: Vec<Outgoing>,
    /// Last broadcast state, the diff base shared with every client
    replica: RoomState,
}

impl<S: Simulation + PlayerRegistry> ServerRoom<S> {
    /// Create a room over a fresh simulation
    pub fn new(config: RoomConfig, sim: S) -> Self {
        let tracker = ConfirmationTracker::new(config.static_delay, config.rollback_window);
        let frame = config.static_delay + 1;
        Self {
            config,
            players: IndexMap::new(),
            tracker,
            sim,
            frame,
            ticks: frame - 1,
            owner: None,
            started: false,
            inbox: VecDeque::new(),
            outbox: Vec::new(),
            replica: RoomState::default(),
        }
    }

    /// The next frame the room will simulate
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Wall-clock ticks elapsed since the room started
    pub fn ticks(&self) -> Frame {
        self.ticks
    }

    /// Whether the game has started
    pub fn started(&self) -> bool {
        self.started
    }

    /// The current room owner
    pub fn owner(&self) -> Option<&PlayerId> {
        self.owner.as_ref()
    }

    /// Number of players in the room
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The confirmation tracker, for inspection
    pub fn tracker(&self) -> &ConfirmationTracker {
        &self.tracker
    }

    /// The simulation, for inspection
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// The last broadcast replica (every client's diff base)
    pub fn replicated_state(&self) -> &RoomState {
        &self.replica
    }

    /// A player's stored authoritative input for `frame`
    pub fn player_input(&self, id: &PlayerId, frame: Frame) -> Option<Input> {
        self.players.get(id).map(|player| player.ring.get(frame))
    }

    /// Messages queued since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Add a player to the room
    ///
    /// The first joiner becomes the owner. Joining an already running game
    /// is rejected: the start broadcast is the only way clients learn the
    /// player set (matchmaking beyond that is out of scope).
    pub fn join(&mut self, id: PlayerId) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        self.tracker.add_player(id.clone())?;

        let spawn = if self.config.spawn_positions.is_empty() {
            Vec2::ZERO
        } else {
            self.config.spawn_positions[self.players.len() % self.config.spawn_positions.len()]
        };
        let ring = InputRingBuffer::new(self.config.input_window())?;
        self.sim.spawn_player(&id, spawn);
        self.players.insert(id.clone(), ServerPlayer { ring, spawn });
        self.owner.get_or_insert(id);
        Ok(())
    }

    /// Remove a player from the room
    ///
    /// Ownership passes to the next player in join order. The tracker
    /// recomputes its minimum, so a departing laggard stops holding the
    /// room's timeline back.
    pub fn leave(&mut self, id: &PlayerId) -> Result<()> {
        self.tracker.remove_player(id)?;
        self.players.shift_remove(id);
        self.sim.despawn_player(id);
        if self.owner.as_ref() == Some(id) {
            self.owner = self.players.keys().next().cloned();
        }
        Ok(())
    }

    /// Process one decoded client message
    pub fn handle_message(&mut self, from: &PlayerId, message: Message) -> Result<()> {
        match message {
            Message::Input(input) => {
                self.inbox.push_back((from.clone(), input));
                Ok(())
            }
            Message::Ping => {
                self.outbox.push(Outgoing {
                    to: Some(from.clone()),
                    message: Message::Pong,
                });
                Ok(())
            }
            Message::CheckOwnership { client } => {
                self.outbox.push(Outgoing {
                    to: Some(from.clone()),
                    message: Message::OwnershipStatus {
                        is_owner: self.owner.as_ref() == Some(&client),
                    },
                });
                Ok(())
            }
            Message::StartGame { client } => self.start_game(client),
            other => {
                log::debug!("Ignoring client-bound message on the server: {:?}", other);
                Ok(())
            }
        }
    }

    /// Advance the room by one scheduler tick
    ///
    /// Drains every queued input first (a rollback-relevant ordering: the
    /// frame decision below must see all confirmations from this
    /// interval), applies the forced-confirmation valve, then advances the
    /// authoritative frame only while the tracker proves every player's
    /// input for it is known, and finally broadcasts the state delta.
    pub fn tick(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        self.ticks += 1;
        self.drain_inbox()?;

        if let Some(forced) = self.tracker.try_force_confirmation(self.ticks) {
            let floor = self.ticks - self.config.rollback_window;
            for confirmation in forced {
                if let Some(player) = self.players.get_mut(&confirmation.player) {
                    // Fill the skipped frames with the player's last known
                    // input so the replicated ring stays meaningful.
                    player.ring.copy_forward(confirmation.from_frame, floor);
                }
            }
        }

        while self.frame <= self.tracker.global_confirmed_frame() {
            for (id, player) in &self.players {
                let input = player.ring.get(self.frame);
                self.sim.apply_input(id, &input);
            }
            self.sim.step();
            self.frame += 1;
        }

        self.broadcast_state();
        Ok(())
    }

    fn drain_inbox(&mut self) -> Result<()> {
        while let Some((id, input)) = self.inbox.pop_front() {
            if !self.players.contains_key(&id) {
                log::warn!("[{}] Input from a player no longer in the room", id);
                continue;
            }

            // Clients send the undelayed frame; it lands in the shared
            // timeline shifted by the static delay.
            let target = input.frame + self.config.static_delay;
            if self.tracker.confirm_input(&id, target)? {
                if let Some(player) = self.players.get_mut(&id) {
                    player.ring.set(target, input);
                }
            }
        }
        Ok(())
    }

    fn start_game(&mut self, client: PlayerId) -> Result<()> {
        if self.started {
            log::debug!("Duplicate start command ignored");
            return Ok(());
        }
        if self.owner.as_ref() != Some(&client) {
            return Err(Error::NotOwner(client));
        }

        self.started = true;
        let players = self
            .players
            .iter()
            .map(|(id, player)| PlayerSpawn {
                id: id.clone(),
                position: player.spawn,
            })
            .collect();
        self.outbox.push(Outgoing {
            to: None,
            message: Message::GameStarting {
                start_in_ms: self.config.start_in_ms,
                players,
            },
        });
        Ok(())
    }

    fn broadcast_state(&mut self) {
        let next = self.current_state();
        let patch = diff(&self.replica, &next);
        if patch.is_empty() {
            return;
        }
        self.outbox.push(Outgoing {
            to: None,
            message: Message::State(patch),
        });
        self.replica = next;
    }

    fn current_state(&self) -> RoomState {
        RoomState {
            frame: self.frame - 1,
            env: self.config.env.clone(),
            players: self
                .players
                .iter()
                .map(|(id, player)| {
                    (
                        id.clone(),
                        InputHistory {
                            inputs: player.ring.slots().to_vec(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientConfig, ClientSession};
    use rewind_core::RawInput;
    use rewind_netcode::apply;
    use rewind_sim::PlatformWorld;

    const FLOOR: f32 = 4.0;

    fn player(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn press_right() -> RawInput {
        RawInput {
            right: true,
            ..RawInput::default()
        }
    }

    fn input(frame: Frame, raw: RawInput) -> Input {
        Input::new(frame, raw)
    }

    fn started_room() -> ServerRoom<PlatformWorld> {
        let mut room = ServerRoom::new(RoomConfig::default(), PlatformWorld::new(FLOOR));
        room.join(player("a")).unwrap();
        room.join(player("b")).unwrap();
        room.handle_message(&player("a"), Message::StartGame { client: player("a") })
            .unwrap();
        room
    }

    #[test]
    fn test_first_joiner_owns_the_room() {
        let mut room = ServerRoom::new(RoomConfig::default(), PlatformWorld::new(FLOOR));
        room.join(player("a")).unwrap();
        room.join(player("b")).unwrap();
        assert_eq!(room.owner(), Some(&player("a")));

        room.handle_message(
            &player("b"),
            Message::CheckOwnership { client: player("b") },
        )
        .unwrap();
        let replies = room.drain_outbox();
        assert!(matches!(
            replies[0].message,
            Message::OwnershipStatus { is_owner: false }
        ));
        assert_eq!(replies[0].to, Some(player("b")));

        // Ownership passes to the next joiner when the owner leaves.
        room.leave(&player("a")).unwrap();
        assert_eq!(room.owner(), Some(&player("b")));
    }

    #[test]
    fn test_only_the_owner_starts_the_game() {
        let mut room = ServerRoom::new(RoomConfig::default(), PlatformWorld::new(FLOOR));
        room.join(player("a")).unwrap();
        room.join(player("b")).unwrap();

        let refused = room.handle_message(&player("b"), Message::StartGame { client: player("b") });
        assert!(matches!(refused, Err(Error::NotOwner(_))));
        assert!(!room.started());

        room.handle_message(&player("a"), Message::StartGame { client: player("a") })
            .unwrap();
        assert!(room.started());

        let broadcast = room.drain_outbox();
        match &broadcast[0].message {
            Message::GameStarting { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("expected GameStarting, got {:?}", other),
        }
        assert_eq!(broadcast[0].to, None);

        assert!(matches!(room.join(player("c")), Err(Error::AlreadyStarted)));
    }

    #[test]
    fn test_frame_advances_only_through_confirmed_inputs() {
        let mut room = started_room();
        let start_frame = room.frame();

        // Nothing confirmed: the authoritative timeline must not move.
        room.tick().unwrap();
        room.tick().unwrap();
        assert_eq!(room.frame(), start_frame);

        // Only one of two players confirmed: still no proof for the frame.
        room.handle_message(&player("a"), Message::Input(input(1, press_right())))
            .unwrap();
        room.tick().unwrap();
        assert_eq!(room.frame(), start_frame);

        room.handle_message(&player("b"), Message::Input(input(1, RawInput::default())))
            .unwrap();
        room.tick().unwrap();
        assert_eq!(room.frame(), start_frame + 1);
    }

    #[test]
    fn test_input_is_stored_under_the_delayed_frame() {
        let mut room = started_room();

        room.handle_message(&player("a"), Message::Input(input(1, press_right())))
            .unwrap();
        room.tick().unwrap();

        let delay = RoomConfig::default().static_delay;
        let stored = room.player_input(&player("a"), 1 + delay).unwrap();
        assert_eq!(stored.frame, 1 + delay);
        assert!(stored.right);
    }

    #[test]
    fn test_stalled_player_is_forced_and_room_keeps_moving() {
        let mut room = started_room();
        let window = RoomConfig::default().rollback_window;
        let delay = RoomConfig::default().static_delay;

        // b confirms frame 1 and then goes silent; a keeps sending.
        room.handle_message(&player("b"), Message::Input(input(1, press_right())))
            .unwrap();
        for raw_frame in 1..=(window + 10) {
            room.handle_message(&player("a"), Message::Input(input(raw_frame, RawInput::default())))
                .unwrap();
            room.tick().unwrap();
        }

        // The room advanced well past b's stall: the simulated frame sits
        // right behind the forced floor instead of b's frame 4.
        let floor = room.ticks() - window;
        assert!(room.frame() > 1 + delay + 1);
        assert_eq!(room.frame(), floor + 1);
        assert_eq!(room.tracker().global_confirmed_frame(), floor);

        // b's skipped frames were filled with its last real input.
        for frame in (1 + delay + 1)..=floor {
            let filled = room.player_input(&player("b"), frame).unwrap();
            assert_eq!(filled.frame, frame);
            assert!(filled.right);
        }
    }

    #[test]
    fn test_patch_stream_rebuilds_the_replica() {
        let mut room = started_room();
        let mut rebuilt = RoomState::default();

        for raw_frame in 1..=5 {
            room.handle_message(&player("a"), Message::Input(input(raw_frame, press_right())))
                .unwrap();
            room.handle_message(&player("b"), Message::Input(input(raw_frame, RawInput::default())))
                .unwrap();
            room.tick().unwrap();

            for outgoing in room.drain_outbox() {
                if let Message::State(patch) = outgoing.message {
                    rebuilt = apply(&rebuilt, &patch);
                }
            }
        }

        assert_eq!(&rebuilt, room.replicated_state());
    }

    // In-flight message with its delivery round.
    struct InFlight<T> {
        due: u32,
        payload: T,
    }

    // Delivery preserves send order; state patches are order-sensitive.
    fn due_now<T>(queue: &mut Vec<InFlight<T>>, round: u32) -> Vec<T> {
        let mut ready = Vec::new();
        let mut pending = Vec::new();
        for item in queue.drain(..) {
            if item.due <= round {
                ready.push(item.payload);
            } else {
                pending.push(item);
            }
        }
        *queue = pending;
        ready
    }

    #[test]
    fn test_clients_converge_after_rollback() {
        const LATENCY: u32 = 2;
        const ROUNDS: u32 = 60;

        let ids = (player("a"), player("b"));
        let mut server = ServerRoom::new(RoomConfig::default(), PlatformWorld::new(FLOOR));
        let mut client_a =
            ClientSession::new(ids.0.clone(), ClientConfig::default(), PlatformWorld::new(FLOOR));
        let mut client_b =
            ClientSession::new(ids.1.clone(), ClientConfig::default(), PlatformWorld::new(FLOOR));

        server.join(ids.0.clone()).unwrap();
        server.join(ids.1.clone()).unwrap();
        server
            .handle_message(&ids.0, Message::StartGame { client: ids.0.clone() })
            .unwrap();
        for outgoing in server.drain_outbox() {
            client_a.handle_message(outgoing.message.clone()).unwrap();
            client_b.handle_message(outgoing.message).unwrap();
        }

        let mut to_server: Vec<InFlight<(PlayerId, Message)>> = Vec::new();
        let mut to_clients: Vec<InFlight<Message>> = Vec::new();

        for round in 0..ROUNDS {
            // Inbound first, then the tick: handler-vs-tick ordering.
            for message in due_now(&mut to_clients, round) {
                client_a.handle_message(message.clone()).unwrap();
                client_b.handle_message(message).unwrap();
            }

            // b holds right for a few frames; a never presses anything, so
            // a's extrapolation of b is guaranteed to be wrong.
            let b_controls = if (5..10).contains(&round) {
                press_right()
            } else {
                RawInput::default()
            };
            client_a.tick(RawInput::default()).unwrap();
            client_b.tick(b_controls).unwrap();

            for message in client_a.drain_outbox() {
                to_server.push(InFlight {
                    due: round + LATENCY,
                    payload: (ids.0.clone(), message),
                });
            }
            for message in client_b.drain_outbox() {
                to_server.push(InFlight {
                    due: round + LATENCY,
                    payload: (ids.1.clone(), message),
                });
            }

            for (from, message) in due_now(&mut to_server, round) {
                server.handle_message(&from, message).unwrap();
            }
            server.tick().unwrap();
            for outgoing in server.drain_outbox() {
                assert_eq!(outgoing.to, None);
                to_clients.push(InFlight {
                    due: round + LATENCY,
                    payload: outgoing.message,
                });
            }
        }

        // a mispredicted b's presses and had to rewind; b predicted
        // everything correctly.
        assert!(client_a.rollbacks_performed() >= 1);
        assert_eq!(client_b.rollbacks_performed(), 0);
        assert_eq!(client_a.current_frame(), client_b.current_frame());

        // After every confirmation has been applied and replayed, the two
        // predicted worlds are bit-identical.
        for id in [&ids.0, &ids.1] {
            let in_a = client_a.sim().player_handle(id).unwrap();
            let in_b = client_b.sim().player_handle(id).unwrap();
            let state_a = client_a.sim().body_state(in_a).unwrap();
            let state_b = client_b.sim().body_state(in_b).unwrap();
            assert_eq!(state_a.position.to_array(), state_b.position.to_array());
            assert_eq!(
                state_a.linear_velocity.to_array(),
                state_b.linear_velocity.to_array()
            );
        }
    }
}
