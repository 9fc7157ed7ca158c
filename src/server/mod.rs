//! Notification scheduler module
//!
//! The [`WatchServer`] decides what one accessory shows. It holds the live
//! notifications, the queue of notifications waiting for the screen, the
//! current weather report and the registered watchlets, and reacts to
//! notification events and to events reported by the watch.
//!
//! Display decisions go through a single transition: the target (queue head,
//! else current watchlet, else idle) is computed from the state first and
//! applied once afterwards.

pub mod notification;
pub mod queue;
pub mod watchlet;

#[cfg(test)]
pub(crate) mod testing;

pub use self::notification::{
    summarize, BasicNotification, Notification, NotificationEvent, NotificationHandle,
    NotificationSink,
};
pub use self::queue::PendingQueue;
pub use self::watchlet::{Watchlet, WatchletSlot, WatchletState};

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{
    Error, NotificationId, NotificationKind, Result, DEFAULT_STALE_THRESHOLD_SECS,
    TIME_SYNC_INTERVAL_SECS,
};
use crate::protocol::{Watch, WatchEvent};
use crate::time::util::is_stale;
use crate::time::{earliest, Timer};

/// What the screen should show next
enum DisplayTarget {
    Notification(NotificationHandle),
    Watchlet(usize),
    Idle,
}

/// Display arbitration for one watch
pub struct WatchServer<W: Watch> {
    watch: W,
    stale_threshold: Duration,
    next_button: Option<usize>,
    /// Live notifications by kind, in arrival order
    notifications: BTreeMap<NotificationKind, Vec<NotificationHandle>>,
    /// Item count last observed per live notification
    counts: HashMap<NotificationId, u32>,
    pending: PendingQueue,
    weather: Option<NotificationHandle>,
    watchlets: Vec<WatchletSlot>,
    current: Option<usize>,
    /// Position in the watchlet list used by [`WatchServer::next_watchlet`]
    cycle_index: Option<usize>,
    sync_timer: Timer,
}

impl<W: Watch> WatchServer<W> {
    pub fn new(watch: W) -> Self {
        WatchServer {
            watch,
            stale_threshold: Duration::from_secs(DEFAULT_STALE_THRESHOLD_SECS),
            next_button: None,
            notifications: BTreeMap::new(),
            counts: HashMap::new(),
            pending: PendingQueue::new(),
            weather: None,
            watchlets: Vec::new(),
            current: None,
            cycle_index: None,
            sync_timer: Timer::new(),
        }
    }

    pub fn watch(&self) -> &W {
        &self.watch
    }

    pub fn watch_mut(&mut self) -> &mut W {
        &mut self.watch
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Notifications older than `threshold` are recorded but never shown
    pub fn set_stale_threshold(&mut self, threshold: Duration) {
        self.stale_threshold = threshold;
    }

    pub fn next_watchlet_button(&self) -> Option<usize> {
        self.next_button
    }

    /// Binds the button that skips notifications and cycles watchlets.
    ///
    /// `None` or an unknown name leaves the binding unset.
    pub fn set_next_watchlet_button(&mut self, name: Option<&str>) -> Result<()> {
        let button = match name {
            Some(name) => match self.watch.buttons().iter().position(|b| *b == name) {
                Some(button) => Some(button),
                None => {
                    self.unbind_next_button();
                    return Err(Error::config(format!("unknown button {:?}", name)));
                }
            },
            None => None,
        };
        self.unbind_next_button();
        if let Some(button) = button {
            debug!(button = name, "binding next watchlet button");
            self.watch.grab_button(button);
            self.next_button = Some(button);
        }
        Ok(())
    }

    fn unbind_next_button(&mut self) {
        if let Some(old) = self.next_button.take() {
            self.watch.ungrab_button(old);
        }
    }

    /// Adds a watchlet; ids must be unique
    pub fn register_watchlet(&mut self, watchlet: Box<dyn Watchlet>) -> Result<()> {
        if self.watchlets.iter().any(|w| w.id() == watchlet.id()) {
            return Err(Error::config(format!("watchlet {} registered twice", watchlet.id())));
        }
        debug!(watchlet = watchlet.id(), "registered watchlet");
        self.watchlets.push(WatchletSlot::new(watchlet));
        Ok(())
    }

    /// Registered watchlet ids, in cycling order
    pub fn watchlets(&self) -> Vec<&str> {
        self.watchlets.iter().map(|w| w.id()).collect()
    }

    pub fn current_watchlet(&self) -> Option<&str> {
        self.current.map(|i| self.watchlets[i].id())
    }

    pub fn is_current_watchlet_active(&self) -> bool {
        self.current.map_or(false, |i| self.watchlets[i].is_active())
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn current_weather(&self) -> Option<&NotificationHandle> {
        self.weather.as_ref()
    }

    /// Every live notification, grouped by kind
    pub fn live_notifications(&self) -> Vec<NotificationHandle> {
        self.notifications.values().flatten().cloned().collect()
    }

    /// Sum of the item counts of live notifications of `kind`
    pub fn notification_count(&self, kind: NotificationKind) -> u32 {
        self.notifications
            .get(&kind)
            .map_or(0, |list| list.iter().map(|n| n.count()).sum())
    }

    fn is_live(&self, id: NotificationId) -> bool {
        self.counts.contains_key(&id)
    }

    fn refresh_count(&mut self, kind: NotificationKind) {
        let count = self.notification_count(kind);
        self.watch.update_notification_count(kind, count);
    }

    /// Dispatches an event reported by a notification source
    pub fn handle_notification_event(&mut self, event: NotificationEvent) {
        match event {
            NotificationEvent::Posted(n) => self.post_notification(n),
            NotificationEvent::Changed(n) => self.notification_changed(n),
            NotificationEvent::Dismissed(n) => self.notification_dismissed(n),
        }
    }

    /// Takes in a new notification
    pub fn post_notification(&mut self, n: NotificationHandle) {
        let id = n.id();
        let kind = n.kind();
        if self.is_live(id) {
            debug!(?id, "notification posted twice, treating as a change");
            self.notification_changed(n);
            return;
        }

        info!(?id, ?kind, title = %n.title(), "new notification");
        self.notifications.entry(kind).or_default().push(n.clone());
        self.counts.insert(id, n.count());
        self.refresh_count(kind);

        if kind == NotificationKind::Weather {
            let report = n.weather();
            self.weather = Some(n);
            self.watch.update_weather(report.as_ref());
            return;
        }

        if is_stale(n.timestamp(), Utc::now(), self.stale_threshold) {
            debug!(?id, timestamp = %n.timestamp(), "notification too old to show");
            return;
        }

        if self.pending.is_empty() {
            self.pending.enqueue(n);
            self.next_notification();
        } else if kind == NotificationKind::Call {
            self.pending.preempt(n);
            self.next_notification();
        } else {
            self.pending.enqueue(n);
        }
    }

    /// Reacts to a change of a live notification
    pub fn notification_changed(&mut self, n: NotificationHandle) {
        let id = n.id();
        let kind = n.kind();
        let Some(&last_count) = self.counts.get(&id) else {
            debug!(?id, "change for unknown notification");
            return;
        };
        let count = n.count();
        self.counts.insert(id, count);

        if kind == NotificationKind::Weather {
            let newer = self
                .weather
                .as_ref()
                .map_or(true, |w| w.timestamp() <= n.timestamp());
            if newer {
                self.weather = Some(n.clone());
            }
            if self.weather.as_ref().map_or(false, |w| w.id() == id) {
                self.watch.update_weather(n.weather().as_ref());
            }
        } else if self.pending.is_head(id) {
            self.next_notification();
        } else if count > last_count {
            debug!(?id, count, "notification count increased");
            let was_empty = self.pending.is_empty();
            if self.pending.enqueue(n) && was_empty {
                self.next_notification();
            }
        }

        self.refresh_count(kind);
    }

    /// Forgets a dismissed notification
    pub fn notification_dismissed(&mut self, n: NotificationHandle) {
        let id = n.id();
        let kind = n.kind();
        if self.counts.remove(&id).is_none() {
            debug!(?id, "dismissal of unknown notification");
            return;
        }
        if let Some(list) = self.notifications.get_mut(&kind) {
            list.retain(|other| other.id() != id);
        }
        debug!(?id, ?kind, "notification dismissed");

        let was_head = self.pending.is_head(id);
        self.pending.remove_all(id);
        if was_head {
            self.next_notification();
        }

        if self.weather.as_ref().map_or(false, |w| w.id() == id) {
            self.weather = None;
            self.watch.update_weather(None);
        }

        self.refresh_count(kind);
    }

    fn display_target(&self) -> DisplayTarget {
        if let Some(head) = self.pending.head() {
            DisplayTarget::Notification(head.clone())
        } else if let Some(index) = self.current {
            DisplayTarget::Watchlet(index)
        } else {
            DisplayTarget::Idle
        }
    }

    /// Puts the highest priority item on screen
    fn next_notification(&mut self) {
        if !self.watch.is_connected() {
            return;
        }
        match self.display_target() {
            DisplayTarget::Notification(head) => {
                self.deactivate_current();
                self.watch.display_notification(&summarize(&*head));
            }
            DisplayTarget::Watchlet(index) => self.reactivate(index),
            DisplayTarget::Idle => self.watch.display_idle(),
        }
    }

    fn reactivate(&mut self, index: usize) {
        self.watch.display_application();
        self.watchlets[index].activate(&mut self.watch);
    }

    fn deactivate_current(&mut self) {
        if let Some(index) = self.current {
            self.watchlets[index].deactivate(&mut self.watch);
        }
    }

    /// Makes `id` the current watchlet.
    ///
    /// It takes the screen immediately unless the watch is disconnected or a
    /// notification is pending; otherwise it is activated once those clear.
    pub fn run_watchlet(&mut self, id: &str) -> Result<()> {
        let index = self
            .watchlets
            .iter()
            .position(|w| w.id() == id)
            .ok_or_else(|| Error::invalid_state(format!("no watchlet named {}", id)))?;

        if self.current != Some(index) {
            self.deactivate_current();
        }
        info!(watchlet = id, "running watchlet");
        self.current = Some(index);
        self.cycle_index = Some(index);
        if self.watch.is_connected() && self.pending.is_empty() {
            self.reactivate(index);
        }
        Ok(())
    }

    /// Leaves the current watchlet
    pub fn close_watchlet(&mut self) {
        if let Some(index) = self.current {
            info!(watchlet = self.watchlets[index].id(), "closing watchlet");
        }
        self.deactivate_current();
        self.current = None;
        if self.watch.is_connected() && self.pending.is_empty() {
            self.watch.display_idle();
        }
    }

    /// Runs the next registered watchlet; past the last one, closes it
    pub fn next_watchlet(&mut self) {
        let next = self.cycle_index.map_or(0, |i| i + 1);
        if next >= self.watchlets.len() {
            self.cycle_index = None;
            self.close_watchlet();
            return;
        }
        let id = self.watchlets[next].id().to_string();
        if let Err(e) = self.run_watchlet(&id) {
            warn!(error = %e, "cannot cycle watchlets");
        }
    }

    fn sync_time(&mut self) {
        debug!("synchronising watch clock");
        self.watch.set_date_time(Local::now());
        self.sync_timer.start(Duration::from_secs(TIME_SYNC_INTERVAL_SECS));
    }

    /// Reacts to an event reported by the watch
    pub fn on_watch_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Connected => {
                self.sync_time();
                self.next_notification();
            }
            WatchEvent::Disconnected => {
                self.sync_timer.stop();
                self.deactivate_current();
                if !self.pending.is_empty() {
                    debug!(dropped = self.pending.len(), "dropping pending notifications");
                }
                self.pending.clear();
            }
            WatchEvent::Idling => {
                self.pending.dequeue();
                self.next_notification();
            }
            WatchEvent::ButtonPressed(button) => {
                if Some(button) != self.next_button {
                    debug!(button, "ignoring unbound button");
                    return;
                }
                if self.pending.is_empty() {
                    self.next_watchlet();
                } else {
                    self.pending.dequeue();
                    self.next_notification();
                }
            }
            WatchEvent::Unavailable => {
                warn!("watch unavailable until restarted");
                self.sync_timer.stop();
                self.deactivate_current();
                self.pending.clear();
            }
        }
    }

    /// Fires due timers of the scheduler and the active watchlet
    pub fn poll_timers(&mut self) {
        if self.sync_timer.fire(Instant::now()) && self.watch.is_connected() {
            self.sync_time();
        }
        if let Some(index) = self.current {
            self.watchlets[index].poll_timers(&mut self.watch);
        }
    }

    /// Earliest armed deadline of the scheduler and the active watchlet
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.sync_timer.deadline(),
            self.current.and_then(|i| self.watchlets[i].next_deadline()),
        ])
    }
}
