//! Transmit queue and background sender task.
//!
//! One sender task per controller owns all transport writes. Callers push
//! `(compiled bytes, hang time)` entries from any thread; the task drains
//! them in enqueue order, parking on the channel when idle instead of
//! spinning. After each write it sleeps for the entry's hang time so a long
//! uninterruptible move does not keep the CPU busy re-polling the queue.
//!
//! Safety: each `SenderTask` spawns exactly one thread that is shut down
//! when the task is dropped (the channel disconnects and the loop exits).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chassis_traits::{Clock, Transport};
use crossbeam_channel as xch;

use crate::codec::CompiledCommand;

/// One queued transmission: wire bytes plus the post-send hang time.
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    pub bytes: CompiledCommand,
    pub hang_time: Duration,
}

pub(crate) struct SenderTask {
    tx: Option<xch::Sender<QueueEntry>>,
    depth: Arc<AtomicUsize>,
    join_handle: Option<JoinHandle<()>>,
}

impl SenderTask {
    /// Spawn the sender thread for `transport`. The transport is shared
    /// behind a mutex so the debug channel can read from it; only this task
    /// ever writes.
    pub(crate) fn spawn<T, C>(transport: Arc<Mutex<T>>, clock: C) -> Self
    where
        T: Transport + Send + 'static,
        C: Clock + Send + 'static,
    {
        let (tx, rx) = xch::unbounded::<QueueEntry>();
        let depth = Arc::new(AtomicUsize::new(0));
        let depth_clone = depth.clone();

        let join_handle = std::thread::spawn(move || {
            // recv() parks while the queue is empty; Err means every sender
            // handle was dropped and the task should exit.
            while let Ok(entry) = rx.recv() {
                match transport.lock() {
                    Ok(mut port) => {
                        if let Err(e) = port.write(entry.bytes.as_bytes()) {
                            // Lossy-but-live: a single bad write must never
                            // wedge the queue.
                            tracing::warn!(error = %e, "transport write failed, dropping command");
                        }
                    }
                    Err(_) => {
                        tracing::warn!("transport mutex poisoned, dropping command");
                    }
                }
                depth_clone.fetch_sub(1, Ordering::Relaxed);
                if !entry.hang_time.is_zero() {
                    clock.sleep(entry.hang_time);
                }
            }
            tracing::trace!("sender task exiting cleanly");
        });

        Self {
            tx: Some(tx),
            depth,
            join_handle: Some(join_handle),
        }
    }

    /// Append an entry to the transmit queue. Never blocks on I/O.
    pub(crate) fn push(&self, entry: QueueEntry) {
        if let Some(tx) = &self.tx {
            self.depth.fetch_add(1, Ordering::Relaxed);
            if tx.send(entry).is_err() {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                tracing::warn!("sender task gone, command dropped");
            }
        }
    }

    /// Entries pushed but not yet written to the transport.
    pub(crate) fn pending(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

impl Drop for SenderTask {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the
        // thread out of recv() once the queue is drained.
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sender thread joined"),
                Err(e) => tracing::warn!(?e, "sender thread panicked during shutdown"),
            }
        }
    }
}
