//! Blocking, interruptible busy-wait primitives.
//!
//! Action timing needs millisecond-to-microsecond granularity and must
//! re-check a breaker predicate every iteration, which rules out a
//! scheduler-level sleep on the embedded hosts this targets. Every timed
//! wait in the engine goes through `spin_until` so the loop exists in
//! exactly one place.

use std::time::{Duration, Instant};

use crate::watcher::Watcher;

/// Busy-wait for `duration` with no early exit.
pub fn spin_for(duration: Duration) {
    spin_until(duration, None);
}

/// Busy-wait until `duration` elapses or `breaker` returns true, whichever
/// comes first. Returns true iff the breaker fired.
///
/// A zero duration returns false immediately without polling the breaker.
pub fn spin_until(duration: Duration, breaker: Option<&Watcher>) -> bool {
    let start = Instant::now();
    loop {
        if start.elapsed() >= duration {
            return false;
        }
        if let Some(breaker) = breaker
            && breaker.check()
        {
            return true;
        }
        std::hint::spin_loop();
    }
}
