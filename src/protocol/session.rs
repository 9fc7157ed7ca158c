use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::core::{ConnectionState, Error, Mode, NotificationKind, WeatherReport, BUTTON_NAMES};
use crate::time::{earliest, Timer};
use super::framebuffer::{Framebuffer, SYSTEM_AREA_HEIGHT};
use super::message::{
    logical_button, parse_real_time_clock, BatteryStatus, ButtonPress, DeviceType, Message,
    MessageType, STATUS_DISPLAY_TIMEOUT, STATUS_MODE_CHANGE,
};
use super::render::{IdleOverlay, PlainRenderer, Renderer};
use super::watch::{NotificationSummary, Watch, WatchEvent};

/// Seconds to wait before each reconnection attempt
pub const DEFAULT_BACKOFF_SECS: [u64; 6] = [5, 10, 30, 60, 120, 300];

/// Device session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum spacing between two transmitted frames
    pub pacing_interval: Duration,
    /// Delays before successive reconnection attempts
    pub backoff: Vec<Duration>,
    /// Seconds the accessory shows a notification before idling
    pub notification_timeout_secs: u8,
    /// Vibration length announcing a notification
    pub notification_vibrate_ms: u16,
    /// Period of the ring while a call is shown
    pub ring_interval: Duration,
    /// Vibration length of one ring
    pub ring_vibrate_ms: u16,
    /// Clock shows 24 hour time
    pub twenty_four_hour: bool,
    /// Dates are shown day first
    pub day_month_order: bool,
    pub invert_idle: bool,
    pub invert_notifications: bool,
    pub invert_applications: bool,
    /// Battery voltage raising a low battery warning
    pub battery_warning_mv: u16,
    /// Battery voltage at which the accessory turns its radio off
    pub battery_radio_off_mv: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            pacing_interval: Duration::from_millis(30),
            backoff: DEFAULT_BACKOFF_SECS.iter().map(|&s| Duration::from_secs(s)).collect(),
            notification_timeout_secs: 15,
            notification_vibrate_ms: 500,
            ring_interval: Duration::from_millis(2500),
            ring_vibrate_ms: 1000,
            twenty_four_hour: true,
            day_month_order: true,
            invert_idle: false,
            invert_notifications: false,
            invert_applications: false,
            battery_warning_mv: 3500,
            battery_radio_off_mv: 3300,
        }
    }
}

/// I/O the session asks its driver to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Start a connection attempt
    Connect,
    /// Write one message to the link
    Transmit(Message),
    /// Close the link
    Disconnect,
}

/// Snapshot of the session for status reporting
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub mode: Mode,
    /// Retries are exhausted; the session waits for [`DeviceSession::restart`]
    pub unavailable: bool,
    pub device_type: Option<DeviceType>,
    pub information: Option<String>,
    pub battery: Option<BatteryStatus>,
}

/// Protocol session with one accessory.
///
/// The session performs no I/O itself: it turns display commands and link
/// events into [`SessionAction`]s for its driver and [`WatchEvent`]s for the
/// scheduler, and owns every timer involved (pacing, backoff, ringing).
pub struct DeviceSession {
    config: SessionConfig,
    state: ConnectionState,
    /// Index into the backoff table of the next retry
    retries: usize,
    unavailable: bool,
    /// Mode last requested by the scheduler or reported by the accessory
    mode: Mode,
    /// A mode was requested while disconnected
    replay_mode: bool,
    /// A clock update was requested while disconnected
    replay_time: bool,
    last_notification: Option<NotificationSummary>,
    grabbed: BTreeSet<usize>,
    outbox: VecDeque<Message>,
    actions: VecDeque<SessionAction>,
    events: VecDeque<WatchEvent>,
    pacing: Timer,
    reconnect: Timer,
    ring: Timer,
    ringing: bool,
    last_transmit: Option<Instant>,
    buffers: [Framebuffer; 3],
    overlay: IdleOverlay,
    renderer: Box<dyn Renderer>,
    device_type: Option<DeviceType>,
    information: Option<String>,
    battery: Option<BatteryStatus>,
}

impl DeviceSession {
    /// Creates a disconnected session using the built-in renderer
    pub fn new(config: SessionConfig) -> Self {
        Self::with_renderer(config, Box::new(PlainRenderer))
    }

    /// Creates a disconnected session drawing through `renderer`
    pub fn with_renderer(config: SessionConfig, renderer: Box<dyn Renderer>) -> Self {
        DeviceSession {
            config,
            state: ConnectionState::Disconnected,
            retries: 0,
            unavailable: false,
            mode: Mode::Idle,
            replay_mode: false,
            replay_time: false,
            last_notification: None,
            grabbed: BTreeSet::new(),
            outbox: VecDeque::new(),
            actions: VecDeque::new(),
            events: VecDeque::new(),
            pacing: Timer::new(),
            reconnect: Timer::new(),
            ring: Timer::new(),
            ringing: false,
            last_transmit: None,
            buffers: [Framebuffer::new(), Framebuffer::new(), Framebuffer::new()],
            overlay: IdleOverlay::default(),
            renderer,
            device_type: None,
            information: None,
            battery: None,
        }
    }

    /// Current link state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Mode the accessory is believed to show
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Idle screen decoration state
    pub fn overlay(&self) -> &IdleOverlay {
        &self.overlay
    }

    /// Number of messages waiting for their pacing slot
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            mode: self.mode,
            unavailable: self.unavailable,
            device_type: self.device_type,
            information: self.information.clone(),
            battery: self.battery,
        }
    }

    /// Begins connecting if the session is idle
    pub fn start(&mut self) {
        if self.state == ConnectionState::Disconnected && !self.reconnect.is_armed() && !self.unavailable {
            self.retries = 0;
            self.begin_attempt();
        }
    }

    /// Re-enables a session whose retries were exhausted
    pub fn restart(&mut self) {
        if self.state != ConnectionState::Disconnected {
            return;
        }
        info!("restarting connection attempts");
        self.unavailable = false;
        self.reconnect.stop();
        self.retries = 0;
        self.begin_attempt();
    }

    /// Closes the link without scheduling a reconnection
    pub fn shutdown(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;
        if self.state != ConnectionState::Disconnected {
            self.actions.push_back(SessionAction::Disconnect);
        }
        self.reset_link();
        self.reconnect.stop();
        if was_connected {
            self.events.push_back(WatchEvent::Disconnected);
        }
    }

    fn begin_attempt(&mut self) {
        let attempt = self.retries + 1;
        info!(attempt, "connecting to watch");
        self.state = ConnectionState::Connecting { attempt };
        self.actions.push_back(SessionAction::Connect);
    }

    /// The transport finished connecting
    pub fn on_link_connected(&mut self) {
        if !matches!(self.state, ConnectionState::Connecting { .. }) {
            warn!(state = ?self.state, "unexpected link connection");
        }
        info!("watch connected");
        self.state = ConnectionState::Connected;
        self.retries = 0;
        self.unavailable = false;
        self.reconnect.stop();
        self.outbox.clear();
        for buffer in self.buffers.iter_mut() {
            buffer.invalidate();
        }

        self.handshake();

        if self.replay_time {
            self.replay_time = false;
            self.set_date_time(Local::now());
        }
        if self.replay_mode {
            self.replay_mode = false;
            self.show_mode(self.mode, false);
        }

        self.events.push_back(WatchEvent::Connected);
    }

    fn handshake(&mut self) {
        self.send(Message::get_device_type());
        self.send(Message::get_information_string());
        self.send(Message::configure_idle_buffer_size(false));
        self.send(Message::battery_configuration(
            self.config.battery_warning_mv,
            self.config.battery_radio_off_mv,
        ));
        self.send(Message::read_battery_voltage());
        let grabbed: Vec<usize> = self.grabbed.iter().copied().collect();
        for button in grabbed {
            self.send_button_config(button, true);
        }
    }

    /// The transport reported an error; the link is gone
    pub fn on_link_error(&mut self, error: &io::Error) {
        warn!(kind = ?error.kind(), %error, "watch link error");
        self.link_lost();
    }

    /// The peer closed the link
    pub fn on_link_closed(&mut self) {
        info!("watch link closed");
        self.link_lost();
    }

    fn link_lost(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.reset_link();
        if was_connected {
            self.events.push_back(WatchEvent::Disconnected);
        }
        self.schedule_reconnect();
    }

    fn reset_link(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.outbox.clear();
        self.pacing.stop();
        self.ring.stop();
        self.ringing = false;
    }

    fn schedule_reconnect(&mut self) {
        match self.config.backoff.get(self.retries).copied() {
            Some(delay) => {
                self.retries += 1;
                info!(delay = ?delay, retry = self.retries, "scheduling reconnection");
                self.reconnect.start(delay);
            }
            None => {
                let err = Error::RetriesExhausted { attempts: self.retries + 1 };
                warn!(error = %err, "giving up on watch");
                self.unavailable = true;
                self.events.push_back(WatchEvent::Unavailable);
            }
        }
    }

    /// Processes one decoded inbound message
    pub fn on_message(&mut self, msg: Message) {
        trace!(msg_type = msg.msg_type, options = msg.options, len = msg.payload.len(), "received message");
        match msg.message_type() {
            Some(MessageType::ButtonEvent) => self.handle_button_event(&msg),
            Some(MessageType::StatusChangeEvent) => self.handle_status_change(&msg),
            Some(MessageType::GetDeviceTypeResponse) => match msg.payload.first() {
                Some(&code) => {
                    let device_type = DeviceType::from_code(code);
                    info!(?device_type, "watch device type");
                    self.device_type = Some(device_type);
                }
                None => warn!("empty device type response"),
            },
            Some(MessageType::GetInformationStringResponse) => {
                let information = String::from_utf8_lossy(&msg.payload)
                    .trim_end_matches('\0')
                    .to_string();
                info!(%information, "watch information");
                self.information = Some(information);
            }
            Some(MessageType::GetRealTimeClockResponse) => match parse_real_time_clock(&msg.payload) {
                Some(time) => debug!(%time, "watch clock"),
                None => warn!("malformed clock response"),
            },
            Some(MessageType::ReadBatteryVoltageResponse) => match BatteryStatus::parse(&msg.payload) {
                Some(battery) => {
                    debug!(?battery, "watch battery");
                    self.battery = Some(battery);
                }
                None => warn!("malformed battery response"),
            },
            Some(MessageType::LowBatteryWarning) => warn!("watch battery low"),
            Some(MessageType::LowBatteryBluetoothOff) => warn!("watch battery critical, radio shutting down"),
            Some(MessageType::ReadButtonConfigurationResponse) | Some(MessageType::Accelerometer) => {
                debug!(msg_type = msg.msg_type, "ignoring message");
            }
            Some(other) => {
                let err = Error::protocol(format!("unexpected {:?} from watch", other));
                warn!(error = %err, "ignoring message");
            }
            None => {
                let err = Error::protocol(format!("unknown message type {:#04x}", msg.msg_type));
                warn!(error = %err, "ignoring message");
            }
        }
    }

    fn handle_button_event(&mut self, msg: &Message) {
        match msg.payload.first().copied().and_then(logical_button) {
            Some(button) => {
                debug!(button = BUTTON_NAMES[button], "button pressed");
                self.events.push_back(WatchEvent::ButtonPressed(button));
            }
            None => warn!(payload = ?msg.payload, "button event for unknown button"),
        }
    }

    fn handle_status_change(&mut self, msg: &Message) {
        let reported = Mode::from_code(msg.options);
        match msg.payload.first().copied() {
            Some(STATUS_DISPLAY_TIMEOUT) => {
                debug!(?reported, "watch display timeout");
                if reported == Some(Mode::Notification) && self.mode == Mode::Notification {
                    self.mode = Mode::Idle;
                    self.stop_ringing();
                    self.events.push_back(WatchEvent::Idling);
                }
            }
            Some(STATUS_MODE_CHANGE) => {
                debug!(?reported, "watch mode changed");
                if let Some(mode) = reported {
                    if mode != Mode::Notification {
                        self.stop_ringing();
                    }
                    self.mode = mode;
                }
            }
            other => debug!(status = ?other, "ignoring status change"),
        }
    }

    /// Fires due timers
    pub fn poll_timers(&mut self) {
        let now = Instant::now();

        if self.reconnect.fire(now) {
            self.begin_attempt();
        }

        if self.pacing.fire(now) {
            if let Some(msg) = self.outbox.pop_front() {
                self.last_transmit = Some(now);
                self.actions.push_back(SessionAction::Transmit(msg));
            }
            if !self.outbox.is_empty() {
                self.pacing.start(self.config.pacing_interval);
            }
        }

        if self.ring.fire(now) && self.ringing {
            if self.state == ConnectionState::Connected && self.mode == Mode::Notification {
                self.send(Message::set_vibrate_mode(true, self.config.ring_vibrate_ms, 0, 1));
                self.ring.start(self.config.ring_interval);
            } else {
                self.ringing = false;
            }
        }
    }

    /// Earliest armed timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.pacing.deadline(),
            self.reconnect.deadline(),
            self.ring.deadline(),
        ])
    }

    /// Next I/O request for the driver
    pub fn take_action(&mut self) -> Option<SessionAction> {
        self.actions.pop_front()
    }

    /// Next event for the scheduler
    pub fn take_event(&mut self) -> Option<WatchEvent> {
        self.events.pop_front()
    }

    /// Queues a message for paced delivery; dropped while disconnected
    fn send(&mut self, msg: Message) {
        if self.state != ConnectionState::Connected {
            trace!(msg_type = msg.msg_type, "not connected, dropping message");
            return;
        }
        self.outbox.push_back(msg);
        if !self.pacing.is_armed() {
            let wait = match self.last_transmit {
                Some(at) => self.config.pacing_interval.saturating_sub(at.elapsed()),
                None => Duration::ZERO,
            };
            self.pacing.start(wait);
        }
    }

    fn send_button_config(&mut self, button: usize, enable: bool) {
        for mode in Mode::ALL {
            let msg = if enable {
                Message::enable_button(mode, button, ButtonPress::PressAndRelease)
            } else {
                Message::disable_button(mode, button, ButtonPress::PressAndRelease)
            };
            if let Some(msg) = msg {
                self.send(msg);
            }
        }
    }

    fn stop_ringing(&mut self) {
        self.ringing = false;
        self.ring.stop();
    }

    fn flush_buffer(&mut self, mode: Mode) {
        let first_row = if mode == Mode::Idle { SYSTEM_AREA_HEIGHT } else { 0 };
        let messages = self.buffers[mode.code() as usize].flush(mode, first_row);
        for msg in messages {
            self.send(msg);
        }
        self.send(Message::update_display(mode));
    }

    fn redraw_idle(&mut self) {
        let buffer = &mut self.buffers[Mode::Idle.code() as usize];
        self.renderer.render_idle(&self.overlay, buffer);
        self.flush_buffer(Mode::Idle);
    }

    /// Puts `mode` on screen; `alert` vibrates for notifications
    fn show_mode(&mut self, mode: Mode, alert: bool) {
        match mode {
            Mode::Idle => self.redraw_idle(),
            Mode::Application => {
                self.send(Message::configure_mode(
                    Mode::Application,
                    0,
                    self.config.invert_applications,
                ));
                self.flush_buffer(Mode::Application);
            }
            Mode::Notification => {
                let Some(notification) = self.last_notification.clone() else {
                    self.mode = Mode::Idle;
                    self.redraw_idle();
                    return;
                };
                let buffer = &mut self.buffers[Mode::Notification.code() as usize];
                self.renderer.render_notification(&notification, buffer);
                self.send(Message::configure_mode(
                    Mode::Notification,
                    self.config.notification_timeout_secs,
                    self.config.invert_notifications,
                ));
                self.flush_buffer(Mode::Notification);

                if alert {
                    if notification.kind == NotificationKind::Call {
                        self.ringing = true;
                        self.send(Message::set_vibrate_mode(true, self.config.ring_vibrate_ms, 0, 1));
                        self.ring.start(self.config.ring_interval);
                    } else {
                        self.send(Message::set_vibrate_mode(
                            true,
                            self.config.notification_vibrate_ms,
                            0,
                            1,
                        ));
                    }
                }
            }
        }
    }

    fn switch_mode(&mut self, mode: Mode, alert: bool) {
        self.stop_ringing();
        self.mode = mode;
        if self.state != ConnectionState::Connected {
            self.replay_mode = true;
            return;
        }
        self.show_mode(mode, alert);
    }
}

impl Watch for DeviceSession {
    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn buttons(&self) -> &[&'static str] {
        &BUTTON_NAMES
    }

    fn display_idle(&mut self) {
        debug!("display idle");
        self.switch_mode(Mode::Idle, false);
    }

    fn display_application(&mut self) {
        debug!("display application");
        self.switch_mode(Mode::Application, false);
    }

    fn display_notification(&mut self, notification: &NotificationSummary) {
        debug!(title = %notification.title, count = notification.count, "display notification");
        self.last_notification = Some(notification.clone());
        self.switch_mode(Mode::Notification, true);
    }

    fn update_notification_count(&mut self, kind: NotificationKind, count: u32) {
        if self.overlay.count(kind) == count {
            return;
        }
        self.overlay.counts[kind.index()] = count;
        if self.is_connected() && self.mode == Mode::Idle {
            self.redraw_idle();
        }
    }

    fn update_weather(&mut self, weather: Option<&WeatherReport>) {
        self.overlay.weather = weather.cloned();
        if self.is_connected() && self.mode == Mode::Idle {
            self.redraw_idle();
        }
    }

    fn vibrate(&mut self, duration_ms: u16) {
        if !self.is_connected() {
            debug!(duration_ms, "not connected, vibration lost");
            return;
        }
        self.send(Message::set_vibrate_mode(true, duration_ms, 0, 1));
    }

    fn grab_button(&mut self, button: usize) {
        if button >= BUTTON_NAMES.len() {
            warn!(button, "cannot grab unknown button");
            return;
        }
        if self.grabbed.insert(button) && self.is_connected() {
            self.send_button_config(button, true);
        }
    }

    fn ungrab_button(&mut self, button: usize) {
        if self.grabbed.remove(&button) && self.is_connected() {
            self.send_button_config(button, false);
        }
    }

    fn set_date_time(&mut self, time: DateTime<Local>) {
        if !self.is_connected() {
            self.replay_time = true;
            return;
        }
        debug!(%time, "setting watch clock");
        self.send(Message::set_real_time_clock(
            time.naive_local(),
            self.config.twenty_four_hour,
            self.config.day_month_order,
        ));
        // Read back so the log shows what the watch accepted
        self.send(Message::get_real_time_clock());
    }

    fn application_buffer(&mut self) -> &mut Framebuffer {
        &mut self.buffers[Mode::Application.code() as usize]
    }

    fn update_application(&mut self) {
        if self.is_connected() && self.mode == Mode::Application {
            self.flush_buffer(Mode::Application);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn connected_session() -> DeviceSession {
        let mut session = DeviceSession::new(SessionConfig::default());
        session.start();
        assert_eq!(session.take_action(), Some(SessionAction::Connect));
        session.on_link_connected();
        assert_eq!(session.take_event(), Some(WatchEvent::Connected));
        session
    }

    /// Lets the pacing timer run until the outbox is empty
    async fn drain(session: &mut DeviceSession) -> Vec<Message> {
        let mut sent = Vec::new();
        loop {
            session.poll_timers();
            while let Some(action) = session.take_action() {
                if let SessionAction::Transmit(msg) = action {
                    sent.push(msg);
                }
            }
            match session.next_deadline() {
                Some(deadline) if session.queued() > 0 || session.pacing.is_armed() => {
                    tokio::time::advance(deadline.saturating_duration_since(Instant::now())).await;
                }
                _ => return sent,
            }
        }
    }

    fn types(messages: &[Message]) -> Vec<MessageType> {
        messages.iter().filter_map(Message::message_type).collect()
    }

    fn summary(kind: NotificationKind) -> NotificationSummary {
        NotificationSummary {
            kind,
            timestamp: Utc::now(),
            title: "Alice".into(),
            body: "hello".into(),
            count: 1,
            weather: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_on_connect() {
        let mut session = connected_session();
        let sent = drain(&mut session).await;
        assert_eq!(
            types(&sent),
            vec![
                MessageType::GetDeviceType,
                MessageType::GetInformationString,
                MessageType::ConfigureIdleBufferSize,
                MessageType::BatteryConfiguration,
                MessageType::ReadBatteryVoltage,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_are_paced() {
        let mut session = connected_session();
        session.poll_timers();
        assert!(matches!(session.take_action(), Some(SessionAction::Transmit(_))));
        assert_eq!(session.take_action(), None);

        // Nothing else goes out before the pacing interval elapses
        tokio::time::advance(Duration::from_millis(29)).await;
        session.poll_timers();
        assert_eq!(session.take_action(), None);

        tokio::time::advance(Duration::from_millis(1)).await;
        session.poll_timers();
        assert!(matches!(session.take_action(), Some(SessionAction::Transmit(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_until_exhausted() {
        let mut session = DeviceSession::new(SessionConfig::default());
        session.start();
        assert_eq!(session.take_action(), Some(SessionAction::Connect));

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        for (i, secs) in DEFAULT_BACKOFF_SECS.iter().enumerate() {
            session.on_link_error(&refused);
            assert_eq!(session.state(), ConnectionState::Disconnected);
            // Failed attempts never produce a disconnected event
            assert_eq!(session.take_event(), None);

            tokio::time::advance(Duration::from_secs(secs - 1)).await;
            session.poll_timers();
            assert_eq!(session.take_action(), None);

            tokio::time::advance(Duration::from_secs(1)).await;
            session.poll_timers();
            assert_eq!(session.take_action(), Some(SessionAction::Connect));
            assert_eq!(session.state(), ConnectionState::Connecting { attempt: i + 2 });
        }

        session.on_link_error(&refused);
        assert_eq!(session.take_event(), Some(WatchEvent::Unavailable));
        assert!(session.status().unavailable);
        assert_eq!(session.next_deadline(), None);

        // Parked until re-enabled
        session.start();
        assert_eq!(session.take_action(), None);
        session.restart();
        assert_eq!(session.take_action(), Some(SessionAction::Connect));
        assert_eq!(session.state(), ConnectionState::Connecting { attempt: 1 });
        assert!(!session.status().unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_clears_queue() {
        let mut session = connected_session();
        assert!(session.queued() > 0);

        session.on_link_closed();
        assert_eq!(session.queued(), 0);
        assert_eq!(session.take_event(), Some(WatchEvent::Disconnected));
        assert_eq!(session.take_event(), None);
        assert_eq!(session.next_deadline(), session.reconnect.deadline());

        // A second report of the same loss is ignored
        session.on_link_closed();
        assert_eq!(session.take_event(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resets_backoff() {
        let mut session = connected_session();
        session.on_link_closed();
        tokio::time::advance(Duration::from_secs(5)).await;
        session.poll_timers();
        assert_eq!(session.take_action(), Some(SessionAction::Connect));
        session.on_link_connected();
        session.on_link_closed();
        assert_eq!(session.reconnect.deadline(), Some(Instant::now() + Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_commands() {
        let mut session = DeviceSession::new(SessionConfig::default());
        session.vibrate(200);
        session.display_application();
        session.set_date_time(Local::now());
        session.grab_button(0);
        assert_eq!(session.queued(), 0);

        session.start();
        session.take_action();
        session.on_link_connected();
        let sent = types(&drain(&mut session).await);

        // Vibration is lost, clock, mode and buttons are replayed
        assert!(!sent.contains(&MessageType::SetVibrateMode));
        assert!(sent.contains(&MessageType::SetRealTimeClock));
        assert_eq!(sent.iter().filter(|t| **t == MessageType::EnableButton).count(), 3);
        assert_eq!(sent.last(), Some(&MessageType::UpdateDisplay));
        assert_eq!(session.mode(), Mode::Application);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_set_is_read_back() {
        let mut session = connected_session();
        drain(&mut session).await;

        session.set_date_time(Local::now());
        assert_eq!(
            types(&drain(&mut session).await),
            vec![MessageType::SetRealTimeClock, MessageType::GetRealTimeClock]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_events() {
        let mut session = connected_session();
        session.on_message(Message::new(MessageType::ButtonEvent, 0, vec![5]).unwrap());
        assert_eq!(session.take_event(), Some(WatchEvent::ButtonPressed(4)));

        session.on_message(Message::new(MessageType::ButtonEvent, 0, vec![4]).unwrap());
        session.on_message(Message::new(MessageType::ButtonEvent, 0, Vec::new()).unwrap());
        assert_eq!(session.take_event(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_messages_ignored() {
        let mut session = connected_session();
        session.on_message(Message {
            msg_type: 0x99,
            options: 0,
            payload: bytes::Bytes::new(),
        });
        session.on_message(Message::get_device_type());
        assert_eq!(session.take_event(), None);
        assert!(session.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_timeout_idles() {
        let mut session = connected_session();
        session.display_notification(&summary(NotificationKind::Sms));
        assert_eq!(session.mode(), Mode::Notification);

        // A timeout for another mode is not ours
        session.on_message(Message::new(MessageType::StatusChangeEvent, 0, vec![STATUS_DISPLAY_TIMEOUT]).unwrap());
        assert_eq!(session.take_event(), None);

        session.on_message(Message::new(MessageType::StatusChangeEvent, 2, vec![STATUS_DISPLAY_TIMEOUT]).unwrap());
        assert_eq!(session.take_event(), Some(WatchEvent::Idling));
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_ring_until_dismissed() {
        let mut session = connected_session();
        drain(&mut session).await;

        session.display_notification(&summary(NotificationKind::Call));
        let sent = types(&drain(&mut session).await);
        assert_eq!(sent.iter().filter(|t| **t == MessageType::SetVibrateMode).count(), 1);

        tokio::time::advance(Duration::from_millis(2500)).await;
        session.poll_timers();
        let sent = types(&drain(&mut session).await);
        assert_eq!(sent, vec![MessageType::SetVibrateMode]);

        session.display_idle();
        tokio::time::advance(Duration::from_secs(10)).await;
        session.poll_timers();
        let sent = types(&drain(&mut session).await);
        assert!(!sent.contains(&MessageType::SetVibrateMode));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_redraw_idle_screen() {
        let mut session = connected_session();
        session.display_idle();
        drain(&mut session).await;

        session.update_notification_count(NotificationKind::Email, 2);
        let sent = types(&drain(&mut session).await);
        assert!(sent.contains(&MessageType::WriteBuffer));
        assert_eq!(sent.last(), Some(&MessageType::UpdateDisplay));

        // Unchanged counts send nothing
        session.update_notification_count(NotificationKind::Email, 2);
        assert_eq!(session.queued(), 0);
        assert_eq!(session.overlay().count(NotificationKind::Email), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown() {
        let mut session = connected_session();
        session.shutdown();
        assert_eq!(session.take_action(), Some(SessionAction::Disconnect));
        assert_eq!(session.take_event(), Some(WatchEvent::Disconnected));
        assert_eq!(session.next_deadline(), None);
    }
}
