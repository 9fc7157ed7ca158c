use std::time::Duration;
use tokio::time::Instant;

/// A single-shot timer that is polled by its owner's event loop.
///
/// The timer never repeats: once it fires it stays disarmed until the owner
/// explicitly starts it again, so a stopped component leaves nothing behind.
#[derive(Debug, Default, Clone)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Creates a disarmed timer
    pub fn new() -> Self {
        Timer { deadline: None }
    }

    /// Arms the timer to fire `after` from now, replacing any earlier deadline
    pub fn start(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    /// Disarms the timer
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Returns whether the timer is armed
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the pending deadline, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms the timer and returns true if its deadline has passed
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Returns the earliest of the given optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
