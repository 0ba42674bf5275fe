pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

/// Byte-oriented link to the motor driver board (typically a serial line).
///
/// The sender task owns all writes; `read` exists only for the interactive
/// debug channel and may return an empty buffer when nothing is pending.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn read(
        &mut self,
        max_len: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Fixed-length, index-stable sensor snapshot, one reading per channel.
pub type Snapshot = Vec<i32>;
