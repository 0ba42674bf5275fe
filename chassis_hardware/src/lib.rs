#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Hardware transports for the chassis engine.
//!
//! Everything here implements `chassis_traits::Transport`; the engine in
//! `chassis_core` never links against a serial stack directly.

pub mod error;
pub mod serial;

pub use error::{HwError, Result};
pub use serial::SerialTransport;
