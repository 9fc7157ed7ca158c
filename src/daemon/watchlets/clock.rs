use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::time::Instant;

use crate::protocol::render::draw_digit;
use crate::protocol::{Framebuffer, Watch};
use crate::server::Watchlet;
use crate::time::Timer;

pub const ID: &str = "clock";

pub fn create() -> Box<dyn Watchlet> {
    Box::new(ClockWatchlet::new())
}

/// Shows the time of day, redrawn on every minute boundary
#[derive(Debug, Default)]
pub struct ClockWatchlet {
    tick: Timer,
}

impl ClockWatchlet {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(fb: &mut Framebuffer, hour: u32, minute: u32) {
        fb.clear(false);
        let scale = 4;
        let y = 38;
        draw_digit(fb, (hour / 10) as u8, 6, y, scale);
        draw_digit(fb, (hour % 10) as u8, 6 + 4 * scale, y, scale);
        fb.fill_rect(6 + 8 * scale, y + scale, scale, scale, true);
        fb.fill_rect(6 + 8 * scale, y + 3 * scale, scale, scale, true);
        draw_digit(fb, (minute / 10) as u8, 6 + 10 * scale, y, scale);
        draw_digit(fb, (minute % 10) as u8, 6 + 14 * scale, y, scale);
    }

    fn refresh(&mut self, watch: &mut dyn Watch) {
        let now = Local::now();
        Self::draw(watch.application_buffer(), now.hour(), now.minute());
        watch.update_application();
        let into_minute = Duration::from_secs(now.second() as u64);
        self.tick.start(Duration::from_secs(60).saturating_sub(into_minute));
    }
}

impl Watchlet for ClockWatchlet {
    fn id(&self) -> &str {
        ID
    }

    fn activate(&mut self, watch: &mut dyn Watch) {
        self.refresh(watch);
    }

    fn deactivate(&mut self, _watch: &mut dyn Watch) {
        self.tick.stop();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.tick.deadline()
    }

    fn poll_timers(&mut self, watch: &mut dyn Watch) {
        if self.tick.fire(Instant::now()) {
            self.refresh(watch);
        }
    }
}
