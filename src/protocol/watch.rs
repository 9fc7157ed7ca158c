use chrono::{DateTime, Local, Utc};

use crate::core::{NotificationKind, WeatherReport};
use super::framebuffer::Framebuffer;

/// What the accessory needs to know to announce a notification
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSummary {
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub count: u32,
    pub weather: Option<WeatherReport>,
}

/// Events a watch reports back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// The link came up and the handshake was queued
    Connected,
    /// The link went down
    Disconnected,
    /// The accessory dismissed the notification screen on its own
    Idling,
    /// A grabbed button was pressed; carries the logical button index
    ButtonPressed(usize),
    /// Reconnection attempts are exhausted until the session is restarted
    Unavailable,
}

/// Display commands the scheduler issues to an accessory.
///
/// Implementations queue commands while disconnected instead of failing;
/// only idempotent state survives until the next connection.
pub trait Watch {
    /// Returns whether the link to the accessory is up
    fn is_connected(&self) -> bool;

    /// Logical button names
    fn buttons(&self) -> &[&'static str];

    /// Shows the idle screen
    fn display_idle(&mut self);

    /// Switches to the application screen
    fn display_application(&mut self);

    /// Announces a notification
    fn display_notification(&mut self, notification: &NotificationSummary);

    /// Updates the unread count shown on the idle screen
    fn update_notification_count(&mut self, kind: NotificationKind, count: u32);

    /// Updates (or clears) the weather shown on the idle screen
    fn update_weather(&mut self, weather: Option<&WeatherReport>);

    /// Vibrates once; lost if the link is down
    fn vibrate(&mut self, duration_ms: u16);

    /// Routes presses of a logical button to the host
    fn grab_button(&mut self, button: usize);

    /// Returns a logical button to the accessory
    fn ungrab_button(&mut self, button: usize);

    /// Sets the accessory clock
    fn set_date_time(&mut self, time: DateTime<Local>);

    /// Buffer watchlets draw into while in application mode
    fn application_buffer(&mut self) -> &mut Framebuffer;

    /// Transmits the changed region of the application buffer
    fn update_application(&mut self);
}
