//! Pooled connection lifecycle states and transitions.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use biphase_core::{BiphaseError, Result};

/// Lifecycle state of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Owned by the pool and available for acquisition.
    InPool,
    /// Checked out by a caller and usable.
    Accessible,
    /// Checked out but suspended, typically because the enclosing global
    /// transaction has been suspended.
    NotAccessible,
    /// Destroyed. Terminal state.
    Closed,
}

impl ConnectionState {
    /// Returns a human-readable name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InPool => "IN_POOL",
            Self::Accessible => "ACCESSIBLE",
            Self::NotAccessible => "NOT_ACCESSIBLE",
            Self::Closed => "CLOSED",
        }
    }

    fn can_transition_to(self, new_state: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, new_state),
            (InPool, Accessible)
                | (Accessible, InPool)
                | (Accessible, NotAccessible)
                | (NotAccessible, Accessible)
                | (InPool, Closed)
                | (Accessible, Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Listener for pooled connection state transitions.
///
/// Both methods have default empty implementations. `state_changing` runs
/// before the new state becomes observable and is the place to release
/// resources tied to the outgoing state; `state_changed` runs once the
/// transition is complete.
pub trait StateListener {
    /// Called before the state changes, while the old state is still
    /// current.
    fn state_changing(&self, _old_state: ConnectionState, _new_state: ConnectionState) {}

    /// Called after the state has changed.
    fn state_changed(&self, _old_state: ConnectionState, _new_state: ConnectionState) {}
}

/// Serialized state holder for one pooled connection.
///
/// Transitions are validated against the permitted lifecycle edges and the
/// listener hooks are invoked around the change: `state_changing` completes
/// before any observer can read the new state, `state_changed` runs after
/// the new state is visible.
#[derive(Debug)]
pub struct StateMachine {
    state: Mutex<ConnectionState>,
}

impl StateMachine {
    /// Creates a state machine starting in [`ConnectionState::InPool`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::InPool),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the current state.
    pub fn get(&self) -> ConnectionState {
        *self.lock()
    }

    /// Requests a transition to `new_state`, notifying `listener` before
    /// and after the change.
    ///
    /// Returns the previous state on success. A request for a transition
    /// outside the permitted lifecycle edges, including a transition to
    /// the current state, fails with
    /// [`BiphaseError::InvalidTransition`] and leaves the state untouched.
    pub fn transition(
        &self,
        new_state: ConnectionState,
        listener: &dyn StateListener,
    ) -> Result<ConnectionState> {
        let mut guard = self.lock();
        let old_state = *guard;
        if !old_state.can_transition_to(new_state) {
            return Err(BiphaseError::InvalidTransition {
                from: old_state.name().to_string(),
                to: new_state.name().to_string(),
            });
        }

        tracing::debug!(from = %old_state, to = %new_state, "changing connection state");
        listener.state_changing(old_state, new_state);
        *guard = new_state;
        drop(guard);
        listener.state_changed(old_state, new_state);
        Ok(old_state)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
