//! Fan-out of log lines to connected observers.
//!
//! The hub owns the two pieces of shared mutable state in the process: the
//! observer registry and the history buffer. Both sit behind one mutex so a
//! subscribe-time replay is atomic with respect to concurrent publishes: a
//! racing line lands either in the replay or in the live stream, never both
//! and never neither.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::watcher::HistoryBuffer;

/// Minimum per-observer queue depth. Bounds how far a slow consumer can lag
/// before it counts as dead. The actual depth is raised to the history
/// capacity when that is larger, so a subscribe-time replay always fits in
/// a fresh queue.
const MIN_OBSERVER_QUEUE_DEPTH: usize = 256;

/// Unique id of a connected observer, from a monotonic counter.
pub type ObserverId = u64;

struct HubState {
    next_id: ObserverId,
    observers: HashMap<ObserverId, mpsc::Sender<String>>,
    history: HistoryBuffer,
}

/// Registry of connected observers plus the replay history, behind one lock.
///
/// The lock is never held across an await: delivery uses `try_send` into
/// each observer's bounded queue, so one slow client cannot stall the poll
/// loop or the other observers.
pub struct Hub {
    state: Mutex<HubState>,
    queue_depth: usize,
}

impl Hub {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                next_id: 0,
                observers: HashMap::new(),
                history: HistoryBuffer::new(history_capacity),
            }),
            queue_depth: history_capacity.max(MIN_OBSERVER_QUEUE_DEPTH),
        }
    }

    /// Seed the history buffer, oldest first. Called once at startup with
    /// the initial tail of the file.
    pub fn preload(&self, lines: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state.history.extend(lines);
    }

    /// Register a new observer and replay the current history into its
    /// queue, oldest line first. Returns the assigned id and the receiving
    /// end the transport reads from.
    pub fn subscribe(&self) -> (ObserverId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let mut state = self.state.lock().unwrap();

        let id = state.next_id;
        state.next_id += 1;

        for line in state.history.snapshot() {
            // Fresh queue at least as deep as the history bound; cannot fail.
            let _ = tx.try_send(line);
        }
        state.observers.insert(id, tx);
        info!(id, total = state.observers.len(), "observer subscribed");
        (id, rx)
    }

    /// Remove an observer and release its sink. Unknown or already-removed
    /// ids are a no-op.
    pub fn unsubscribe(&self, id: ObserverId) {
        let mut state = self.state.lock().unwrap();
        if state.observers.remove(&id).is_some() {
            info!(id, total = state.observers.len(), "observer unsubscribed");
        }
    }

    /// Append a line to history and deliver it to every connected observer.
    ///
    /// An observer whose queue is closed or full is dropped from the
    /// registry on the spot; the remaining observers still get the line.
    pub fn publish(&self, line: String) {
        let mut state = self.state.lock().unwrap();
        state.history.push(line.clone());

        let mut dead = Vec::new();
        for (&id, tx) in &state.observers {
            if let Err(e) = tx.try_send(line.clone()) {
                warn!(id, error = %e, "observer sink failed, dropping it");
                dead.push(id);
            }
        }
        for id in dead {
            state.observers.remove(&id);
        }
    }

    /// Lines currently held for replay, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.snapshot()
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().unwrap().observers.len()
    }
}
