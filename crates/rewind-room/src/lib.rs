//! Rewind Room - The frame loops that tie the protocol together
//!
//! A room is the unit of exclusive ownership: one single-threaded loop per
//! process owns the player maps, input rings, snapshot history, and the
//! simulation, and drives them with a fixed timestep. There is no locking
//! because there is nothing to share; correctness instead depends on
//! ordering, and both loops encode it the same way: all inbound messages
//! are fully processed before a tick evaluates a rollback decision or
//! advances the frame counter.
//!
//! - `ClientSession`: capture input → decide rollback → simulate → snapshot
//! - `ServerRoom`: drain confirmations → force stragglers → advance only
//!   through proven frames → broadcast the state delta
//!
//! Transport is external: both loops consume decoded `Message`s and queue
//! outgoing ones; how the bytes move is the caller's business.

mod client;
mod config;
mod error;
mod server;

pub use client::ClientSession;
pub use config::{ClientConfig, RoomConfig};
pub use error::{Error, Result};
pub use server::{Outgoing, ServerRoom};
