//! Rollback netcode demo
//!
//! Runs one authoritative server room and two predictive clients in a
//! single process, exchanging encoded wire messages through an in-memory
//! queue with a fixed simulated latency. The manual clock drives the tick
//! scheduler, so the whole run is deterministic and completes instantly.
//!
//! Run with logging to watch divergences and rollbacks as they happen:
//!
//! ```text
//! RUST_LOG=debug cargo run -p platformer_demo
//! ```

use log::info;
use rewind_core::{ManualClock, PlayerId, RawInput, TickScheduler};
use rewind_netcode::{decode, encode};
use rewind_room::{ClientConfig, ClientSession, RoomConfig, ServerRoom};
use rewind_sim::PlatformWorld;
use std::collections::VecDeque;

const FLOOR_Y: f32 = 4.0;
const TICK_RATE: u32 = 60;
const LATENCY_TICKS: u64 = 3;
const RUN_TICKS: u64 = 600;

/// A one-direction byte pipe with fixed latency, in ticks
struct Pipe {
    queue: VecDeque<(u64, Vec<u8>)>,
}

impl Pipe {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    fn send(&mut self, now: u64, bytes: Vec<u8>) {
        self.queue.push_back((now + LATENCY_TICKS, bytes));
    }

    fn deliver(&mut self, now: u64) -> Vec<Vec<u8>> {
        let mut ready = Vec::new();
        while self.queue.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, bytes)) = self.queue.pop_front() {
                ready.push(bytes);
            }
        }
        ready
    }
}

/// Scripted controls: alice drifts left late, bob hops right early
fn controls(tick: u64, local: &str) -> RawInput {
    match local {
        "alice" => RawInput {
            left: (300..360).contains(&tick),
            ..RawInput::default()
        },
        _ => RawInput {
            right: (60..180).contains(&tick),
            jump: tick % 90 == 0 && tick > 0,
            ..RawInput::default()
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let alice = PlayerId::new("alice");
    let bob = PlayerId::new("bob");

    let mut server = ServerRoom::new(RoomConfig::default(), PlatformWorld::new(FLOOR_Y));
    let mut clients = vec![
        ClientSession::new(
            alice.clone(),
            ClientConfig::default(),
            PlatformWorld::new(FLOOR_Y),
        ),
        ClientSession::new(
            bob.clone(),
            ClientConfig::default(),
            PlatformWorld::new(FLOOR_Y),
        ),
    ];

    server.join(alice.clone())?;
    server.join(bob.clone())?;

    // The lobby handshake: alice owns the room and starts the game. The
    // demo delivers these synchronously; latency only applies in-game.
    clients[0].check_ownership();
    clients[0].request_start();
    for client in &mut clients {
        for message in client.drain_outbox() {
            let id = client.local_id().clone();
            server.handle_message(&id, decode(&encode(&message)?)?)?;
        }
    }
    for outgoing in server.drain_outbox() {
        for client in &mut clients {
            let targeted = outgoing.to.as_ref().map_or(true, |to| to == client.local_id());
            if targeted {
                client.handle_message(decode(&encode(&outgoing.message)?)?)?;
            }
        }
    }
    info!(
        "room started, owner: {:?}",
        server.owner().map(PlayerId::as_str)
    );

    let mut to_server = vec![Pipe::new(), Pipe::new()];
    let mut to_clients = vec![Pipe::new(), Pipe::new()];

    let mut scheduler = TickScheduler::with_rate(ManualClock::new(), TICK_RATE);
    let mut now = 0u64;
    let period = scheduler.period();
    while now < RUN_TICKS {
        scheduler.clock_mut().advance(period);

        for _ in 0..scheduler.due_frames() {
            // Handlers before ticks, on both sides of the wire.
            for (index, client) in clients.iter_mut().enumerate() {
                for bytes in to_clients[index].deliver(now) {
                    client.handle_message(decode(&bytes)?)?;
                }

                let local = client.local_id().as_str().to_string();
                client.tick(controls(now, &local))?;
                for message in client.drain_outbox() {
                    to_server[index].send(now, encode(&message)?);
                }
            }

            for (index, pipe) in to_server.iter_mut().enumerate() {
                let id = clients[index].local_id().clone();
                for bytes in pipe.deliver(now) {
                    server.handle_message(&id, decode(&bytes)?)?;
                }
            }
            server.tick()?;
            for outgoing in server.drain_outbox() {
                for (index, pipe) in to_clients.iter_mut().enumerate() {
                    let targeted = outgoing
                        .to
                        .as_ref()
                        .map_or(true, |to| to == clients[index].local_id());
                    if targeted {
                        pipe.send(now, encode(&outgoing.message)?);
                    }
                }
            }

            now += 1;
        }
    }

    for client in &clients {
        let stats = client.snapshot_stats();
        info!(
            "{}: frame {}, rollbacks {}, snapshots [{}, {}]",
            client.local_id(),
            client.current_frame(),
            client.rollbacks_performed(),
            stats.oldest_frame,
            stats.newest_frame
        );
        for id in [&alice, &bob] {
            if let Some(handle) = client.sim().player_handle(id) {
                if let Some(state) = client.sim().body_state(handle) {
                    info!(
                        "  sees {} at ({:.3}, {:.3})",
                        id, state.position.x, state.position.y
                    );
                }
            }
        }
    }
    info!(
        "server: frame {}, ticks {}, global confirmed {}",
        server.frame(),
        server.ticks(),
        server.tracker().global_confirmed_frame()
    );

    Ok(())
}
