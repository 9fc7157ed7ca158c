use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{NotificationId, NotificationKind, WeatherReport};
use crate::protocol::NotificationSummary;

/// Contract every notification source implements
pub trait Notification: Send + Sync + fmt::Debug {
    /// Stable identity, unique among live notifications
    fn id(&self) -> NotificationId;

    fn kind(&self) -> NotificationKind;

    /// When the underlying event happened
    fn timestamp(&self) -> DateTime<Utc>;

    fn title(&self) -> String;

    fn body(&self) -> String;

    /// Number of collapsed events, at least 1
    fn count(&self) -> u32;

    /// Weather summary of weather-kind notifications
    fn weather(&self) -> Option<WeatherReport> {
        None
    }

    /// Asks the source to dismiss the notification
    fn dismiss(&self);
}

/// Shared handle to a live notification
pub type NotificationHandle = Arc<dyn Notification>;

/// Builds what the accessory needs to announce `notification`
pub fn summarize(notification: &dyn Notification) -> NotificationSummary {
    NotificationSummary {
        kind: notification.kind(),
        timestamp: notification.timestamp(),
        title: notification.title(),
        body: notification.body(),
        count: notification.count(),
        weather: notification.weather(),
    }
}

/// Lifecycle events sources report to the scheduler
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Posted(NotificationHandle),
    Changed(NotificationHandle),
    Dismissed(NotificationHandle),
}

/// Sending half of a scheduler's notification channel
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationSink {
    /// Creates a sink and the receiver the scheduler's loop drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (NotificationSink { tx }, rx)
    }

    pub fn post(&self, notification: NotificationHandle) {
        self.emit(NotificationEvent::Posted(notification));
    }

    pub fn changed(&self, notification: NotificationHandle) {
        self.emit(NotificationEvent::Changed(notification));
    }

    pub fn dismissed(&self, notification: NotificationHandle) {
        self.emit(NotificationEvent::Dismissed(notification));
    }

    fn emit(&self, event: NotificationEvent) {
        if self.tx.send(event).is_err() {
            debug!("scheduler gone, dropping notification event");
        }
    }
}

#[derive(Debug)]
struct BasicState {
    body: String,
    count: u32,
    weather: Option<WeatherReport>,
    dismissed: bool,
}

/// General purpose notification with a mutable body and count.
///
/// Every mutation is reported through the sink the notification was created
/// with; dismissal is reported once.
pub struct BasicNotification {
    id: NotificationId,
    kind: NotificationKind,
    timestamp: DateTime<Utc>,
    title: String,
    state: Mutex<BasicState>,
    sink: NotificationSink,
    this: Weak<BasicNotification>,
}

impl BasicNotification {
    pub fn new(
        sink: NotificationSink,
        kind: NotificationKind,
        timestamp: DateTime<Utc>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Arc<Self> {
        let title = title.into();
        let body = body.into();
        Arc::new_cyclic(|this| BasicNotification {
            id: NotificationId::next(),
            kind,
            timestamp,
            title,
            state: Mutex::new(BasicState {
                body,
                count: 1,
                weather: None,
                dismissed: false,
            }),
            sink,
            this: this.clone(),
        })
    }

    /// Creates a weather notification for `report`, titled by its location
    pub fn weather_report(
        sink: NotificationSink,
        timestamp: DateTime<Utc>,
        report: WeatherReport,
        description: impl Into<String>,
    ) -> Arc<Self> {
        let notification = Self::new(
            sink,
            NotificationKind::Weather,
            timestamp,
            report.location.clone(),
            description,
        );
        notification.lock().weather = Some(report);
        notification
    }

    fn lock(&self) -> MutexGuard<'_, BasicState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self) -> Option<NotificationHandle> {
        self.this.upgrade().map(|n| n as NotificationHandle)
    }

    /// Hands the notification to the scheduler
    pub fn post(&self) {
        if let Some(handle) = self.handle() {
            self.sink.post(handle);
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut BasicState)) {
        {
            let mut state = self.lock();
            if state.dismissed {
                return;
            }
            f(&mut state);
        }
        if let Some(handle) = self.handle() {
            self.sink.changed(handle);
        }
    }

    pub fn set_body(&self, body: impl Into<String>) {
        let body = body.into();
        self.mutate(|state| state.body = body);
    }

    pub fn set_count(&self, count: u32) {
        self.mutate(|state| state.count = count.max(1));
    }

    pub fn set_weather(&self, report: WeatherReport) {
        self.mutate(|state| state.weather = Some(report));
    }

    pub fn is_dismissed(&self) -> bool {
        self.lock().dismissed
    }
}

impl fmt::Debug for BasicNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicNotification")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("count", &self.lock().count)
            .finish()
    }
}

impl Notification for BasicNotification {
    fn id(&self) -> NotificationId {
        self.id
    }

    fn kind(&self) -> NotificationKind {
        self.kind
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn body(&self) -> String {
        self.lock().body.clone()
    }

    fn count(&self) -> u32 {
        self.lock().count
    }

    fn weather(&self) -> Option<WeatherReport> {
        self.lock().weather.clone()
    }

    fn dismiss(&self) {
        {
            let mut state = self.lock();
            if state.dismissed {
                return;
            }
            state.dismissed = true;
        }
        if let Some(handle) = self.handle() {
            self.sink.dismissed(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TemperatureUnit, WeatherType};

    #[test]
    fn test_events_follow_lifecycle() {
        let (sink, mut rx) = NotificationSink::channel();
        let n = BasicNotification::new(sink, NotificationKind::Email, Utc::now(), "Bob", "lunch?");

        n.post();
        n.set_count(3);
        n.dismiss();
        n.dismiss();
        n.set_body("ignored");

        assert!(matches!(rx.try_recv(), Ok(NotificationEvent::Posted(_))));
        match rx.try_recv() {
            Ok(NotificationEvent::Changed(h)) => assert_eq!(h.count(), 3),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.try_recv() {
            Ok(NotificationEvent::Dismissed(h)) => assert_eq!(h.id(), n.id()),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(n.body(), "lunch?");
        assert!(n.is_dismissed());
    }

    #[test]
    fn test_count_is_at_least_one() {
        let (sink, _rx) = NotificationSink::channel();
        let n = BasicNotification::new(sink, NotificationKind::Sms, Utc::now(), "Carol", "");
        n.set_count(0);
        assert_eq!(n.count(), 1);
    }

    #[test]
    fn test_weather_summary() {
        let (sink, _rx) = NotificationSink::channel();
        let report = WeatherReport {
            location: "Oslo".into(),
            forecast: WeatherType::Snow,
            temperature: -7,
            unit: TemperatureUnit::Celsius,
        };
        let n = BasicNotification::weather_report(sink, Utc::now(), report.clone(), "Light snow");
        let summary = summarize(&*n);
        assert_eq!(summary.body, "Light snow");
        assert_eq!(summary.kind, NotificationKind::Weather);
        assert_eq!(summary.title, "Oslo");
        assert_eq!(summary.weather, Some(report));
    }

    #[test]
    fn test_closed_sink_is_harmless() {
        let (sink, rx) = NotificationSink::channel();
        drop(rx);
        let n = BasicNotification::new(sink, NotificationKind::Call, Utc::now(), "Dave", "");
        n.post();
        n.dismiss();
    }
}
