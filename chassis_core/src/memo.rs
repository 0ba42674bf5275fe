//! Action memoization with optional on-disk snapshots.
//!
//! Building an action allocates and precompiles; sequences replay the same
//! handful of motions thousands of times, so the memoizer interns built
//! actions behind `Arc` and hands out the same instance for the same key.
//! Breaker-free entries can be persisted to a JSON snapshot and reloaded
//! on the next run; breakers close over live sensor state and never
//! persist.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::action::{self, Action, CommandSource};
use crate::codec::SpeedVector;
use crate::error::{ChassisError, Result};

/// Identity of a built action for memoization. Two builders with equal keys
/// produce interchangeable actions, provided breakers carry distinct tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionCacheKey {
    pub speeds: SpeedVector,
    pub duration_ms: u64,
    pub hang_ms: Option<u64>,
    pub breaker_tag: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct PersistedAction {
    source: CommandSource,
    duration_ms: u64,
    hang_ms: Option<u64>,
}

/// Interning table from cache key to built action.
#[derive(Debug, Default)]
pub struct ActionMemoizer {
    table: Mutex<HashMap<ActionCacheKey, Arc<Action>>>,
}

impl ActionMemoizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a memoizer from `path`. A missing file yields an empty table;
    /// an unreadable or corrupt snapshot is logged and discarded rather
    /// than failing startup.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let entries: Vec<(ActionCacheKey, PersistedAction)> = match std::fs::read(path) {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "corrupt action snapshot, starting empty");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no action snapshot, starting empty");
                Vec::new()
            }
        };
        let table = entries
            .into_iter()
            .map(|(key, p)| {
                let rebuilt = action::from_persisted(p.source, p.duration_ms, p.hang_ms);
                (key, Arc::new(rebuilt))
            })
            .collect::<HashMap<_, _>>();
        tracing::info!(entries = table.len(), "action memoizer loaded");
        Self {
            table: Mutex::new(table),
        }
    }

    /// Return the interned action for `key`, invoking `builder` at most
    /// once per key. The table lock is held across the build so concurrent
    /// callers for the same key never race two builds.
    pub fn get_or_build(
        &self,
        key: ActionCacheKey,
        builder: impl FnOnce() -> Arc<Action>,
    ) -> Arc<Action> {
        match self.table.lock() {
            Ok(mut table) => Arc::clone(table.entry(key).or_insert_with(builder)),
            // Poisoned table: fall back to an uncached build rather than
            // propagate the panic of an unrelated thread.
            Err(_) => builder(),
        }
    }

    /// Write the breaker-free entries to `path` as a JSON snapshot.
    pub fn flush(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let entries: Vec<(ActionCacheKey, PersistedAction)> = {
            let table = self
                .table
                .lock()
                .map_err(|_| ChassisError::State("memoizer table poisoned".into()))?;
            table
                .iter()
                .filter(|(_, a)| !a.has_breaker())
                .map(|(key, a)| {
                    let (source, duration_ms, hang_ms) = action::persisted_fields(a);
                    (
                        key.clone(),
                        PersistedAction {
                            source,
                            duration_ms,
                            hang_ms,
                        },
                    )
                })
                .collect()
        };
        let raw = serde_json::to_vec_pretty(&entries)
            .map_err(|e| ChassisError::Snapshot(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| ChassisError::Io(e.to_string()))?;
        tracing::info!(path = %path.display(), entries = entries.len(), "action snapshot written");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut table) = self.table.lock() {
            table.clear();
        }
    }
}
