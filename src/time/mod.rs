//! Timer management module
//!
//! Pacing, reconnection backoff, ringing and clock resynchronisation are all
//! single-shot timers owned by the component that arms them. The per-watch
//! event loop sleeps until the earliest armed deadline and then lets every
//! component poll its own timers.

mod timer;

pub use self::timer::{earliest, Timer};

/// Utility functions for wall-clock handling
pub mod util {
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    /// Returns whether `timestamp` lies more than `threshold` before `now`
    pub fn is_stale(timestamp: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
        match chrono::Duration::from_std(threshold) {
            Ok(threshold) => timestamp < now - threshold,
            Err(_) => false,
        }
    }

}
