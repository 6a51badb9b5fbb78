//! In-process event fan-out for run lifecycle and position events.
//!
//! [`ListenerRegistry`] is an insertion-ordered set of shared listeners. Every
//! fire copies the current set under a short read lock and iterates the copy
//! with no lock held, so a callback may add or remove listeners (itself
//! included) without deadlocking:
//!
//! - listeners added during a fire are not called for that fire;
//! - listeners removed during a fire still receive it if already copied.
//!
//! A callback error stops the remaining fan-out and is returned to the caller
//! that triggered the event. The registry itself is never left half-updated.

use anyhow::Result;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::state::DeviceState;
use super::status::Position;

/// Run lifecycle event.
#[derive(Clone, Debug, PartialEq)]
pub struct RunEvent {
    /// Device that fired the event.
    pub device_name: Option<String>,
    /// Point the event refers to; `None` for state changes.
    pub position: Option<Position>,
    /// State before a transition; equals `state` for boundary events.
    pub old_state: Option<DeviceState>,
    /// Device state when the event fired.
    pub state: Option<DeviceState>,
}

/// A point completed or a move finished.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionEvent {
    /// Device that fired the event.
    pub device_name: Option<String>,
    /// The completed point or reached position.
    pub position: Position,
}

/// Receives state transitions and run/write boundaries.
///
/// All methods default to doing nothing, implement the ones you need.
pub trait RunListener: Send + Sync {
    /// The device moved to `event.state`.
    fn state_changed(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    /// A run is about to start.
    fn run_will_perform(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    /// A run returned, successfully or not.
    fn run_performed(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    /// Data for a point is about to be written.
    fn write_will_perform(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }

    /// Data for a point has been written.
    fn write_performed(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }
}

/// Receives per-point completion and per-move completion.
pub trait PositionListener: Send + Sync {
    /// Point acquisition finished.
    fn position_performed(&self, _event: &PositionEvent) -> Result<()> {
        Ok(())
    }

    /// Motors reached the point's position.
    fn position_move_performed(&self, _event: &PositionEvent) -> Result<()> {
        Ok(())
    }
}

/// Thread-safe ordered set of listeners, compared by identity.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> fmt::Debug for ListenerRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    // Data pointer only; vtable pointers for one type may differ across codegen units.
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<L: ?Sized> ListenerRegistry<L> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Returns false if it was already registered.
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    /// True if this exact listener is registered.
    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.listeners
            .read()
            .iter()
            .any(|l| same_listener(l, listener))
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Copy of the current listener set, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.read().clone()
    }

    /// Call `notify` on a snapshot of the listeners, stopping at the first error.
    pub fn fire<F>(&self, mut notify: F) -> Result<()>
    where
        F: FnMut(&L) -> Result<()>,
    {
        for listener in self.snapshot() {
            notify(&*listener)?;
        }
        Ok(())
    }
}
