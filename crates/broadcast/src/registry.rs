//! Connection registry and fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use telemetry::metrics;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// A serialized observer message, shared by every queue it is sent to.
pub type Frame = Arc<str>;

/// Identifies one observer connection for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

/// Shared, lock-free connection state.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    /// Moves Connecting to Open. Has no effect once Closed.
    pub fn open(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Marks the connection Closed. Returns false if it already was.
    pub fn close(&self) -> bool {
        self.0.swap(ConnectionState::Closed as u8, Ordering::AcqRel) != ConnectionState::Closed as u8
    }

    pub fn is_closed(&self) -> bool {
        self.get() == ConnectionState::Closed
    }
}

/// Registry entry for one observer: its outbound queue and state.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<Frame>,
    pub state: Arc<StateCell>,
}

impl ObserverHandle {
    /// Creates a handle sharing `state`, together with its queue receiver.
    pub fn new(
        id: ConnectionId,
        queue: usize,
        state: Arc<StateCell>,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        (Self { id, tx, state }, rx)
    }

    /// Creates a handle already in the Open state.
    pub fn open(id: ConnectionId, queue: usize) -> (Self, mpsc::Receiver<Frame>) {
        Self::new(id, queue, Arc::new(StateCell::new(ConnectionState::Open)))
    }
}

/// Result of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Live observer connections.
///
/// Fan-out clones the handles under the read lock and enqueues after
/// releasing it; evictions take the write lock afterwards.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<ConnectionId, ObserverHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: ObserverHandle) {
        let len = {
            let mut entries = self.entries.write();
            entries.insert(handle.id, handle);
            entries.len()
        };
        metrics().observers_connected.set(len as u64);
    }

    /// Removes an entry and marks it Closed. Returns whether it was present.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let (removed, len) = {
            let mut entries = self.entries.write();
            let removed = entries.remove(id);
            (removed, entries.len())
        };
        metrics().observers_connected.set(len as u64);

        match removed {
            Some(handle) => {
                handle.state.close();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of every handle.
    pub fn snapshot(&self) -> Vec<ObserverHandle> {
        self.entries.read().values().cloned().collect()
    }

    /// Enqueues `frame` on every registered connection without waiting.
    ///
    /// Connections that are Closed, whose queue is full, or whose writer has
    /// gone away are evicted.
    pub fn fan_out(&self, frame: Frame) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut stale = Vec::new();

        for handle in self.snapshot() {
            if handle.state.is_closed() {
                stale.push(handle.id);
                continue;
            }
            match handle.tx.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection = %handle.id, "Observer queue full, evicting");
                    handle.state.close();
                    stale.push(handle.id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection = %handle.id, "Observer writer gone, evicting");
                    stale.push(handle.id);
                }
            }
        }

        for id in stale {
            if self.remove(&id) {
                report.evicted += 1;
            }
        }

        if report.evicted > 0 {
            metrics().observer_evictions.inc_by(report.evicted as u64);
        }
        report
    }

    /// Drops every entry; writers see their queue close and shut down.
    pub fn close_all(&self) -> usize {
        let drained: Vec<ObserverHandle> = self.entries.write().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.state.close();
        }
        metrics().observers_connected.set(0);
        drained.len()
    }
}
