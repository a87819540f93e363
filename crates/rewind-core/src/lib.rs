//! Rewind Core - Shared types for input-delay rollback netcode
//!
//! This crate provides the leaf types every other rewind crate builds on:
//! - Frame counters and the injectable-clock tick scheduler
//! - Player and body identifiers
//! - Per-frame control inputs and the fixed-capacity input ring
//! - The `Simulation` trait (opaque deterministic step over a body registry)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     rewind-room                          │
//! │   ClientSession (predict + rollback)   ServerRoom        │
//! └───────────┬──────────────────┬──────────────┬────────────┘
//!             │                  │              │
//!      rewind-netcode   rewind-rollback-buffer  │
//!             │                  │              │
//!             └────────── rewind-core ──────────┘
//! ```
//!
//! Everything here is transport-agnostic and allocation-light: rings are
//! sized once at construction and overwritten in place forever after.

mod error;
mod identity;
mod input;
mod sim;
mod time;

pub use error::{Error, Result};
pub use identity::{BodyHandle, PlayerId};
pub use input::{Input, InputRingBuffer, RawInput};
pub use sim::{BodyState, PlayerRegistry, Simulation};
pub use time::{Clock, Frame, ManualClock, SystemClock, TickScheduler};
