//! Composable boolean predicates over live sensor snapshots.
//!
//! A `Watcher` closes over a snapshot accessor, a set of channel indices and
//! threshold bounds. Absolute-threshold watchers compare the current snapshot
//! against fixed bounds; delta watchers compare it against their own previous
//! snapshot, held in a shared `BufferRegistry` and refreshed on every
//! evaluation. Watchers never error: a panicking accessor is a configuration
//! bug outside this layer and propagates to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chassis_traits::Snapshot;

/// Zero-argument sensor snapshot accessor supplied by the hardware layer.
/// Must return a fixed-length, index-stable sequence on every call.
pub type SnapshotFn = Arc<dyn Fn() -> Snapshot + Send + Sync>;

/// A zero-argument boolean predicate over a sensor snapshot. Cheap to clone;
/// clones share the same underlying state (including delta buffers).
#[derive(Clone)]
pub struct Watcher {
    check: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Watcher {
    pub fn new(check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            check: Arc::new(check),
        }
    }

    /// Evaluate the predicate against the live snapshot.
    #[inline]
    pub fn check(&self) -> bool {
        (self.check)()
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").finish_non_exhaustive()
    }
}

/// How per-index (or per-watcher) verdicts are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// Every index must satisfy the bound.
    All,
    /// At least one index must satisfy the bound.
    Any,
}

impl Combine {
    fn eval(self, verdicts: impl Iterator<Item = bool>) -> bool {
        match self {
            Combine::All => {
                let mut any_seen = false;
                let mut ok = true;
                for v in verdicts {
                    any_seen = true;
                    ok &= v;
                }
                any_seen && ok
            }
            Combine::Any => verdicts.fold(false, |acc, v| acc | v),
        }
    }
}

/// Strict bound check shared by threshold and delta watchers. Missing bounds
/// degrade from band-pass to high-pass (min only) or low-pass (max only).
#[inline]
fn in_bounds(value: i32, min: Option<i32>, max: Option<i32>) -> bool {
    match (min, max) {
        (Some(lo), Some(hi)) => lo < value && value < hi,
        (Some(lo), None) => value > lo,
        (None, Some(hi)) => value < hi,
        (None, None) => false,
    }
}

/// Build an absolute-threshold watcher over `indices` of the accessor's
/// snapshot. The shape (high-pass, low-pass, band-pass) follows from which
/// bounds are present; supplying neither yields a watcher that never fires.
pub fn build_threshold(
    accessor: SnapshotFn,
    indices: &[usize],
    min: Option<i32>,
    max: Option<i32>,
    combine: Combine,
) -> Watcher {
    if min.is_none() && max.is_none() {
        tracing::warn!("threshold watcher built without bounds; it will never fire");
    }
    let indices = indices.to_vec();
    Watcher::new(move || {
        let snap = accessor();
        combine.eval(indices.iter().map(|&i| in_bounds(snap[i], min, max)))
    })
}

/// Registry of last-observed snapshots for delta watchers.
///
/// Each delta watcher allocates one slot at build time and captures only its
/// handle; the registry stays the single owner of the buffers. Writers
/// serialize through the internal mutex since watcher evaluation can happen
/// from re-entrant player runs.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    slots: Mutex<HashMap<u64, Snapshot>>,
    next_id: AtomicU64,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, initial: Snapshot) -> u64 {
        let handle = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(handle, initial);
        }
        handle
    }

    /// Store `next` for `handle` and return the previously stored snapshot.
    fn swap(&self, handle: u64, next: Snapshot) -> Snapshot {
        match self.slots.lock() {
            Ok(mut slots) => slots.insert(handle, next).unwrap_or_default(),
            Err(_) => Snapshot::default(),
        }
    }

    /// Number of live delta-watcher slots.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a delta watcher: each evaluation compares the current snapshot
/// against the snapshot seen by the *previous* evaluation of this same
/// watcher (seeded with the snapshot taken at build time), then stores the
/// current one.
pub fn build_delta(
    registry: &Arc<BufferRegistry>,
    accessor: SnapshotFn,
    indices: &[usize],
    min: Option<i32>,
    max: Option<i32>,
    combine: Combine,
) -> Watcher {
    let handle = registry.allocate(accessor());
    let registry = Arc::clone(registry);
    let indices = indices.to_vec();
    Watcher::new(move || {
        let update = accessor();
        let prev = registry.swap(handle, update.clone());
        combine.eval(
            indices
                .iter()
                .map(|&i| in_bounds(update[i] - prev[i], min, max)),
        )
    })
}

/// Combine independent watchers into one. Every input watcher is evaluated
/// on every call (no short-circuit), so delta watchers keep their buffers
/// current even when an earlier verdict already decides the outcome.
pub fn merge(watchers: Vec<Watcher>, combine: Combine) -> Watcher {
    Watcher::new(move || {
        let verdicts: Vec<bool> = watchers.iter().map(Watcher::check).collect();
        combine.eval(verdicts.into_iter())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(values: Snapshot) -> SnapshotFn {
        Arc::new(move || values.clone())
    }

    #[test]
    fn band_pass_requires_both_bounds_strictly() {
        let w = build_threshold(fixed(vec![10, 20, 30]), &[1], Some(15), Some(25), Combine::All);
        assert!(w.check());
        let w = build_threshold(fixed(vec![10, 25, 30]), &[1], Some(15), Some(25), Combine::All);
        assert!(!w.check());
    }

    #[test]
    fn high_pass_and_low_pass_shapes() {
        let snap = fixed(vec![100, 200]);
        assert!(build_threshold(snap.clone(), &[0], Some(50), None, Combine::All).check());
        assert!(!build_threshold(snap.clone(), &[0], Some(150), None, Combine::All).check());
        assert!(build_threshold(snap.clone(), &[0], None, Some(150), Combine::All).check());
        assert!(!build_threshold(snap, &[0], None, Some(50), Combine::All).check());
    }

    #[test]
    fn combine_any_vs_all() {
        let snap = fixed(vec![10, 90]);
        assert!(!build_threshold(snap.clone(), &[0, 1], Some(50), None, Combine::All).check());
        assert!(build_threshold(snap, &[0, 1], Some(50), None, Combine::Any).check());
    }

    #[test]
    fn no_bounds_never_fires() {
        let w = build_threshold(fixed(vec![1]), &[0], None, None, Combine::All);
        assert!(!w.check());
    }

    #[test]
    fn merge_evaluates_every_watcher() {
        use std::sync::atomic::AtomicUsize;
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = |result: bool| {
            let calls = calls.clone();
            Watcher::new(move || {
                calls.fetch_add(1, Ordering::Relaxed);
                result
            })
        };
        let merged = merge(vec![counting(true), counting(false), counting(true)], Combine::Any);
        assert!(merged.check());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }
}
