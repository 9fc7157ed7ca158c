//! Recording watch and watchlet doubles shared by scheduler tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, Utc};

use crate::core::{NotificationKind, WeatherReport, BUTTON_NAMES};
use crate::protocol::{Framebuffer, NotificationSummary, Watch};
use super::notification::{BasicNotification, NotificationHandle, NotificationSink};
use super::watchlet::Watchlet;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Idle,
    Application,
    Notification(String),
    Count(NotificationKind, u32),
    Weather(Option<String>),
    Vibrate(u16),
    Grab(usize),
    Ungrab(usize),
    SetTime,
    UpdateApplication,
}

pub struct RecordingWatch {
    pub connected: bool,
    pub calls: Vec<Call>,
    buffer: Framebuffer,
}

impl RecordingWatch {
    pub fn connected() -> Self {
        RecordingWatch {
            connected: true,
            calls: Vec::new(),
            buffer: Framebuffer::new(),
        }
    }

    pub fn disconnected() -> Self {
        RecordingWatch {
            connected: false,
            ..Self::connected()
        }
    }

    /// Drains the recorded calls, keeping only display transitions
    pub fn take_displays(&mut self) -> Vec<Call> {
        self.calls
            .drain(..)
            .filter(|c| matches!(c, Call::Idle | Call::Application | Call::Notification(_)))
            .collect()
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl Watch for RecordingWatch {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn buttons(&self) -> &[&'static str] {
        &BUTTON_NAMES
    }

    fn display_idle(&mut self) {
        self.calls.push(Call::Idle);
    }

    fn display_application(&mut self) {
        self.calls.push(Call::Application);
    }

    fn display_notification(&mut self, notification: &NotificationSummary) {
        self.calls.push(Call::Notification(notification.title.clone()));
    }

    fn update_notification_count(&mut self, kind: NotificationKind, count: u32) {
        self.calls.push(Call::Count(kind, count));
    }

    fn update_weather(&mut self, weather: Option<&WeatherReport>) {
        self.calls.push(Call::Weather(weather.map(|w| w.location.clone())));
    }

    fn vibrate(&mut self, duration_ms: u16) {
        self.calls.push(Call::Vibrate(duration_ms));
    }

    fn grab_button(&mut self, button: usize) {
        self.calls.push(Call::Grab(button));
    }

    fn ungrab_button(&mut self, button: usize) {
        self.calls.push(Call::Ungrab(button));
    }

    fn set_date_time(&mut self, _time: DateTime<Local>) {
        self.calls.push(Call::SetTime);
    }

    fn application_buffer(&mut self) -> &mut Framebuffer {
        &mut self.buffer
    }

    fn update_application(&mut self) {
        self.calls.push(Call::UpdateApplication);
    }
}

/// Activation log shared between a test and its watchlets
pub type Transitions = Arc<Mutex<Vec<String>>>;

pub struct RecordingWatchlet {
    id: String,
    log: Transitions,
}

impl RecordingWatchlet {
    pub fn boxed(id: &str, log: &Transitions) -> Box<dyn Watchlet> {
        Box::new(RecordingWatchlet {
            id: id.to_string(),
            log: log.clone(),
        })
    }
}

impl Watchlet for RecordingWatchlet {
    fn id(&self) -> &str {
        &self.id
    }

    fn activate(&mut self, _watch: &mut dyn Watch) {
        self.log.lock().unwrap().push(format!("+{}", self.id));
    }

    fn deactivate(&mut self, _watch: &mut dyn Watch) {
        self.log.lock().unwrap().push(format!("-{}", self.id));
    }
}

/// Creates a fresh notification whose events go nowhere
pub fn notification(kind: NotificationKind, title: &str) -> Arc<BasicNotification> {
    notification_at(kind, title, Utc::now())
}

pub fn notification_at(kind: NotificationKind, title: &str, at: DateTime<Utc>) -> Arc<BasicNotification> {
    let (sink, _rx) = NotificationSink::channel();
    BasicNotification::new(sink, kind, at, title, "")
}

pub fn handle(n: &Arc<BasicNotification>) -> NotificationHandle {
    n.clone()
}
