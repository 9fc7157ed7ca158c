use tokio::time::Instant;
use tracing::debug;

use crate::protocol::Watch;

/// A mini application that can own the accessory's application screen
pub trait Watchlet: Send {
    /// Stable, unique identifier
    fn id(&self) -> &str;

    /// The watchlet now owns the application screen
    fn activate(&mut self, watch: &mut dyn Watch);

    /// The watchlet lost the screen; it must stop drawing
    fn deactivate(&mut self, watch: &mut dyn Watch);

    /// Earliest deadline of the watchlet's own timers, polled while active
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Fires due timers while active
    fn poll_timers(&mut self, _watch: &mut dyn Watch) {}
}

/// Lifecycle state of a registered watchlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchletState {
    #[default]
    Inactive,
    Active,
}

/// A registered watchlet and its lifecycle state.
///
/// Transitions only happen from the opposite state, so a watchlet is never
/// activated or deactivated twice in a row.
pub struct WatchletSlot {
    watchlet: Box<dyn Watchlet>,
    state: WatchletState,
}

impl WatchletSlot {
    pub fn new(watchlet: Box<dyn Watchlet>) -> Self {
        WatchletSlot {
            watchlet,
            state: WatchletState::Inactive,
        }
    }

    pub fn id(&self) -> &str {
        self.watchlet.id()
    }

    pub fn state(&self) -> WatchletState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == WatchletState::Active
    }

    /// Activates if inactive; returns whether a transition happened
    pub fn activate(&mut self, watch: &mut dyn Watch) -> bool {
        if self.is_active() {
            return false;
        }
        debug!(watchlet = self.watchlet.id(), "activating watchlet");
        self.state = WatchletState::Active;
        self.watchlet.activate(watch);
        true
    }

    /// Deactivates if active; returns whether a transition happened
    pub fn deactivate(&mut self, watch: &mut dyn Watch) -> bool {
        if !self.is_active() {
            return false;
        }
        debug!(watchlet = self.watchlet.id(), "deactivating watchlet");
        self.state = WatchletState::Inactive;
        self.watchlet.deactivate(watch);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_active() {
            self.watchlet.next_deadline()
        } else {
            None
        }
    }

    pub fn poll_timers(&mut self, watch: &mut dyn Watch) {
        if self.is_active() {
            self.watchlet.poll_timers(watch);
        }
    }
}

impl std::fmt::Debug for WatchletSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchletSlot")
            .field("id", &self.id())
            .field("state", &self.state)
            .finish()
    }
}
