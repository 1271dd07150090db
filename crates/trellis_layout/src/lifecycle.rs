// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layout state machine and change notifications.
//!
//! Every transition bumps the layout version and fires exactly one
//! [`LayoutEvent`]. The current state can always be read synchronously.

use crate::error::LayoutError;
use std::fmt;
use std::sync::Arc;

/// Where a layout is in its computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutState {
    /// Nothing computed yet
    #[default]
    Init,
    /// A background run was launched and has not reported yet
    Start,
    /// Positions are being computed
    Calculating,
    /// Positions are final
    Done,
    /// The last run failed; previous positions are kept
    Error,
}

impl LayoutState {
    /// Whether a computation is in flight
    pub fn is_running(self) -> bool {
        matches!(self, Self::Start | Self::Calculating)
    }

    /// Whether the layout reached a terminal state
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Notification fired on a state transition
#[derive(Debug)]
pub enum LayoutEvent {
    /// A run started
    Start,
    /// Positions changed during a run
    Changed,
    /// A run finished
    Done,
    /// A run failed
    Error(LayoutError),
}

/// Identifier returned when registering a layout listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutListenerId(u64);

/// Callback invoked for every layout event
pub type LayoutListener = Arc<dyn Fn(&LayoutEvent) + Send + Sync>;

/// State, version and listeners shared by every layout
#[derive(Default)]
pub struct LayoutLifecycle {
    state: LayoutState,
    version: u64,
    last_error: Option<String>,
    listeners: Vec<(LayoutListenerId, LayoutListener)>,
    next_listener: u64,
}

impl LayoutLifecycle {
    /// Lifecycle in the `Init` state at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// Transition counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Message of the most recent error, cleared by the next successful run
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Register a listener
    pub fn add_listener(&mut self, listener: LayoutListener) -> LayoutListenerId {
        self.next_listener += 1;
        let id = LayoutListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&mut self, id: LayoutListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// A run started. Background runs stay in `Start` until their first
    /// report; synchronous runs go straight to `Calculating`.
    pub fn notify_start(&mut self, background: bool) {
        let state = if background {
            LayoutState::Start
        } else {
            LayoutState::Calculating
        };
        self.transition(state, LayoutEvent::Start);
    }

    /// Positions moved during a run
    pub fn notify_changed(&mut self) {
        self.transition(LayoutState::Calculating, LayoutEvent::Changed);
    }

    /// The run finished
    pub fn notify_done(&mut self) {
        self.last_error = None;
        self.transition(LayoutState::Done, LayoutEvent::Done);
    }

    /// The run failed
    pub fn notify_error(&mut self, error: LayoutError) {
        tracing::error!("Layout failed: {}", error);
        self.last_error = Some(error.to_string());
        self.transition(LayoutState::Error, LayoutEvent::Error(error));
    }

    fn transition(&mut self, state: LayoutState, event: LayoutEvent) {
        self.state = state;
        self.version += 1;
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for LayoutLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutLifecycle")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_transitions_bump_version_once() {
        let mut lifecycle = LayoutLifecycle::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        lifecycle.add_listener(Arc::new(move |event: &LayoutEvent| {
            sink.lock().push(format!("{:?}", event));
        }));

        assert_eq!(lifecycle.state(), LayoutState::Init);
        lifecycle.notify_start(false);
        assert_eq!(lifecycle.state(), LayoutState::Calculating);
        lifecycle.notify_changed();
        lifecycle.notify_done();
        assert_eq!(lifecycle.state(), LayoutState::Done);
        assert_eq!(lifecycle.version(), 3);
        assert_eq!(*seen.lock(), vec!["Start", "Changed", "Done"]);
    }

    #[test]
    fn test_background_start_and_error() {
        let mut lifecycle = LayoutLifecycle::new();
        lifecycle.notify_start(true);
        assert_eq!(lifecycle.state(), LayoutState::Start);
        assert!(lifecycle.state().is_running());

        lifecycle.notify_error(LayoutError::Cycle("a".into()));
        assert_eq!(lifecycle.state(), LayoutState::Error);
        assert!(lifecycle.last_error().unwrap().contains("cycle"));

        lifecycle.notify_start(false);
        lifecycle.notify_done();
        assert!(lifecycle.last_error().is_none());
    }

    #[test]
    fn test_remove_listener() {
        let mut lifecycle = LayoutLifecycle::new();
        let id = lifecycle.add_listener(Arc::new(|_: &LayoutEvent| {}));
        assert_eq!(lifecycle.listener_count(), 1);
        assert!(lifecycle.remove_listener(id));
        assert!(!lifecycle.remove_listener(id));
    }
}
