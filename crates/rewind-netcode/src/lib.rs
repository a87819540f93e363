//! Rewind Netcode - Input-delay plus rollback synchronization
//!
//! This crate implements both halves of the confirmation protocol:
//!
//! - **Reconciler** (client): per-player predicted and authoritative input
//!   rings, a resolution policy for which source to trust each frame,
//!   divergence detection, and a one-shot deferred rollback request
//! - **ConfirmationTracker** (server): last-confirmed frame per player, the
//!   room-wide confirmed frame as the minimum across players, and the
//!   forced-confirmation valve that bounds how far a stalled client can
//!   hold the room back
//! - **Wire messages**: a closed, tagged message set resolved at the
//!   transport boundary, with bincode encode/decode
//! - **Replication**: an explicit ordered-field diff/apply contract over
//!   the room's authoritative input state
//!
//! # Data flow
//!
//! ```text
//! client captures input ──▶ predicted ring ──▶ Message::Input ──▶ server
//!                                                                  │
//!              ConfirmationTracker records, room rebroadcasts      │
//!                                                                  ▼
//! client receives authoritative input ◀── Message::State(patch) ◀──┘
//!     │
//!     ├─ matches prediction: confirmed, done
//!     └─ differs: RollbackRequest(from = earliest unconfirmed frame),
//!        executed once every player's input for that frame is known
//! ```

mod confirmation;
mod error;
mod reconciler;
mod replication;
mod wire;

pub use confirmation::{ConfirmationTracker, ForcedConfirmation};
pub use error::{Error, Result};
pub use reconciler::Reconciler;
pub use replication::{apply, diff, InputHistory, PlayerPatch, RoomState, RoomStatePatch};
pub use wire::{decode, encode, Message, PlayerSpawn};
