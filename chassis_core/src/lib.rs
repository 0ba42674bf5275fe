#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control engine for a four-wheel chassis (hardware-agnostic).
//!
//! All hardware interaction goes through `chassis_traits::Transport`; the
//! serial implementation lives in `chassis_hardware`.
//!
//! ## Architecture
//!
//! - **Codec**: pure wire-format encoding for the driver board (`codec`)
//! - **Controller**: commanded-speed state, diffing, transmit queue
//!   (`controller`, `sender`)
//! - **Timing**: interruptible busy-wait (`spin`)
//! - **Watchers**: composable sensor predicates, absolute and delta
//!   (`watcher`)
//! - **Actions**: timed motions with breakers and substitutes (`action`),
//!   memoized (`memo`) and sequenced (`player`)

pub mod action;
pub mod codec;
pub mod controller;
pub mod error;
pub mod memo;
pub mod mocks;
pub mod player;
mod sender;
pub mod spin;
pub mod watcher;

pub use action::{Action, ActionBuilder, CommandSource, Interrupt, OverridePolicy};
pub use codec::{
    CompiledCommand, Direction, MotorId, MotorLayout, SpeedVector, MOTOR_COUNT,
};
pub use controller::CloseLoopController;
pub use error::{BuildError, ChassisError, Result};
pub use memo::{ActionCacheKey, ActionMemoizer};
pub use player::ActionPlayer;
pub use watcher::{BufferRegistry, Combine, SnapshotFn, Watcher};
