use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Sleep source for the sender task's post-send hangs. Swapped for a
/// counting clock in tests so hang behavior is asserted without waiting
/// out real time.
pub trait Clock {
    fn sleep(&self, d: Duration);
}

/// Real-time clock backed by `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose sleeps return immediately and accumulate
/// into a shared counter. Clones share the counter, so a test holds one
/// handle while the sender task owns another.
#[derive(Debug, Default, Clone)]
pub struct TestClock {
    slept_nanos: Arc<AtomicU64>,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time slept through this clock so far.
    pub fn slept(&self) -> Duration {
        Duration::from_nanos(self.slept_nanos.load(Ordering::Relaxed))
    }
}

impl Clock for TestClock {
    fn sleep(&self, d: Duration) {
        self.slept_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::Relaxed);
    }
}
