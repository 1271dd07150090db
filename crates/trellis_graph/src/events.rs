// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications emitted by graphs.

use crate::id::EntityId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A change to a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A batch of mutations begins
    TransactionStart,
    /// A batch of mutations ended
    TransactionEnd,
    /// Node inserted
    NodeAdded(EntityId),
    /// Node removed
    NodeRemoved(EntityId),
    /// Node record replaced
    NodeUpdated(EntityId),
    /// Edge inserted
    EdgeAdded(EntityId),
    /// Edge removed
    EdgeRemoved(EntityId),
    /// Edge record replaced
    EdgeUpdated(EntityId),
    /// A tabular graph picked up a new source version
    Synced {
        /// Source version now reflected by the graph
        version: u64,
    },
}

/// Identifier returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked for every graph event
pub type GraphListener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

/// Observer list for [`GraphEvent`]s
#[derive(Default)]
pub struct GraphEvents {
    listeners: Mutex<Vec<(ListenerId, GraphListener)>>,
    next_id: Mutex<u64>,
}

impl GraphEvents {
    /// Create an empty observer list
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn add_listener(&self, listener: GraphListener) -> ListenerId {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let id = ListenerId(*next_id);
        self.listeners.lock().push((id, listener));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Deliver an event to every listener
    pub fn emit(&self, event: &GraphEvent) {
        // Snapshot so listeners may register or unregister while handling.
        let listeners: Vec<GraphListener> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregister every listener
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl fmt::Debug for GraphEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphEvents")
            .field("listeners", &self.len())
            .finish()
    }
}
