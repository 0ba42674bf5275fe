//! Wire-format encoding for the motor driver board.
//!
//! The firmware speaks a line-oriented ASCII protocol: each record is
//! `"{id}v{signed_speed}\r"`, an un-addressed `"v{signed_speed}\r"` is a
//! broadcast applied to all channels, and `"RESET\r"` clears driver state.
//! Batches are the raw concatenation of records; `\r` terminates each one.
//!
//! All functions here are pure. Speed and id ranges are validated by the
//! firmware, not by this layer.

use serde::{Deserialize, Serialize};

/// Number of wheel channels on the platform (fl, rl, rr, fr in wiring order).
pub const MOTOR_COUNT: usize = 4;

/// Physical motor channel id as configured in the driver firmware.
pub type MotorId = u8;

/// Full-robot motion intent, one signed speed per motor in wiring order.
pub type SpeedVector = [i32; MOTOR_COUNT];

/// Per-motor spin direction, fixed at controller construction so that
/// "forward" is consistent across asymmetric wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Multiplier applied to a commanded speed before encoding.
    #[inline]
    pub fn factor(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

/// Motor id and direction assignment for one chassis, in wiring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorLayout {
    pub ids: [MotorId; MOTOR_COUNT],
    pub dirs: [Direction; MOTOR_COUNT],
}

impl MotorLayout {
    pub fn new(ids: [MotorId; MOTOR_COUNT], dirs: [Direction; MOTOR_COUNT]) -> Self {
        Self { ids, dirs }
    }

    /// Render a full four-motor batch for `speeds`, applying directions.
    pub fn compile(&self, speeds: &SpeedVector) -> CompiledCommand {
        encode_batch(&self.ids, speeds, &self.dirs)
    }
}

/// A command already rendered to wire-format bytes, ready to enqueue
/// without further encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCommand {
    bytes: Vec<u8>,
}

impl CompiledCommand {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode one per-motor record: `"{id}v{speed}\r"`.
pub fn encode_single(id: MotorId, speed: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(format!("{id}v{speed}").as_bytes());
    out.push(b'\r');
    out
}

/// Concatenate per-motor records for already direction-adjusted `(id, speed)`
/// pairs, preserving order. This is the per-motor diff path.
pub fn encode_pairs(pairs: &[(MotorId, i32)]) -> CompiledCommand {
    let mut bytes = Vec::with_capacity(pairs.len() * 12);
    for &(id, speed) in pairs {
        bytes.extend_from_slice(&encode_single(id, speed));
    }
    CompiledCommand { bytes }
}

/// Encode a batch covering `ids`, applying `speed * dir` per motor.
/// All slices must have equal length.
pub fn encode_batch(ids: &[MotorId], speeds: &[i32], dirs: &[Direction]) -> CompiledCommand {
    debug_assert_eq!(ids.len(), speeds.len());
    debug_assert_eq!(ids.len(), dirs.len());
    let mut bytes = Vec::with_capacity(ids.len() * 12);
    for ((&id, &speed), &dir) in ids.iter().zip(speeds).zip(dirs) {
        bytes.extend_from_slice(&encode_single(id, speed * dir.factor()));
    }
    CompiledCommand { bytes }
}

/// Encode the un-addressed broadcast form `"v{speed}\r"`. Shorter than four
/// records and processed identically by every channel; this is the stop
/// command when `speed == 0`.
pub fn encode_broadcast(speed: i32) -> CompiledCommand {
    CompiledCommand {
        bytes: encode_raw(&format!("v{speed}")).bytes,
    }
}

/// Encode an arbitrary command string, appending the `\r` terminator.
/// Used by the reset path and the interactive debug channel.
pub fn encode_raw(cmd: &str) -> CompiledCommand {
    let mut bytes = Vec::with_capacity(cmd.len() + 1);
    bytes.extend_from_slice(cmd.as_bytes());
    bytes.push(b'\r');
    CompiledCommand { bytes }
}

/// The `"RESET\r"` command sent once at controller start so firmware state
/// is known regardless of what a prior process left behind.
pub fn reset_command() -> CompiledCommand {
    encode_raw("RESET")
}

/// True when every entry of `speeds` is the same value; such vectors take
/// the broadcast fast path.
#[inline]
pub fn is_uniform(speeds: &SpeedVector) -> bool {
    speeds.iter().all(|&s| s == speeds[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_record_format() {
        assert_eq!(encode_single(1, 0), b"1v0\r");
        assert_eq!(encode_single(4, -1500), b"4v-1500\r");
    }

    #[test]
    fn batch_applies_direction_and_preserves_order() {
        let cmd = encode_batch(
            &[4, 3, 1, 2],
            &[100, -100, 0, 50],
            &[
                Direction::Reverse,
                Direction::Reverse,
                Direction::Forward,
                Direction::Forward,
            ],
        );
        assert_eq!(cmd.as_bytes(), b"4v-100\r3v100\r1v0\r2v50\r");
    }

    #[test]
    fn broadcast_has_no_id() {
        assert_eq!(encode_broadcast(0).as_bytes(), b"v0\r");
        assert_eq!(encode_broadcast(-800).as_bytes(), b"v-800\r");
    }

    #[test]
    fn reset_is_terminated() {
        assert_eq!(reset_command().as_bytes(), b"RESET\r");
    }

    #[test]
    fn uniform_detection() {
        assert!(is_uniform(&[0, 0, 0, 0]));
        assert!(is_uniform(&[700, 700, 700, 700]));
        assert!(!is_uniform(&[700, 700, -700, -700]));
    }

    #[test]
    fn layout_compile_covers_all_motors() {
        let layout = MotorLayout::new(
            [4, 3, 1, 2],
            [
                Direction::Reverse,
                Direction::Reverse,
                Direction::Forward,
                Direction::Forward,
            ],
        );
        let cmd = layout.compile(&[500, 500, 500, 500]);
        assert_eq!(cmd.as_bytes(), b"4v-500\r3v-500\r1v500\r2v500\r");
    }
}
