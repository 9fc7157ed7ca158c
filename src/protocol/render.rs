//! Screen rendering hooks.
//!
//! The session decides *when* a screen has to be redrawn; a [`Renderer`]
//! decides what the pixels look like. Rich content belongs to renderers
//! supplied by the embedder, the built-in [`PlainRenderer`] only draws
//! unread-count bars, a weather glyph and numbers.

use crate::core::{NotificationKind, WeatherReport, WeatherType};
use super::framebuffer::{Framebuffer, SCREEN_WIDTH, SYSTEM_AREA_HEIGHT};
use super::watch::NotificationSummary;

/// State decorating the idle screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdleOverlay {
    /// Unread item count per notification kind, indexed by [`NotificationKind::index`]
    pub counts: [u32; NotificationKind::ALL.len()],
    /// Most recent weather report
    pub weather: Option<WeatherReport>,
}

impl IdleOverlay {
    pub fn count(&self, kind: NotificationKind) -> u32 {
        self.counts[kind.index()]
    }
}

/// Draws screens into display buffers
pub trait Renderer: Send {
    /// Draws the idle screen below the system area
    fn render_idle(&mut self, overlay: &IdleOverlay, fb: &mut Framebuffer);

    /// Draws the screen announcing a notification
    fn render_notification(&mut self, notification: &NotificationSummary, fb: &mut Framebuffer);
}

/// 3×5 digit glyphs, one byte per row, most significant of the low three bits leftmost
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draws one decimal digit with its top-left corner at (x, y), scaled by `scale`
pub fn draw_digit(fb: &mut Framebuffer, digit: u8, x: usize, y: usize, scale: usize) {
    let glyph = DIGITS[(digit % 10) as usize];
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..3 {
            if bits & (0b100 >> col) != 0 {
                fb.fill_rect(x + col * scale, y + row * scale, scale, scale, true);
            }
        }
    }
}

/// Draws a signed number and returns the x coordinate after its last glyph
pub fn draw_number(fb: &mut Framebuffer, value: i64, x: usize, y: usize, scale: usize) -> usize {
    let mut cursor = x;
    if value < 0 {
        fb.fill_rect(cursor, y + 2 * scale, 3 * scale, scale, true);
        cursor += 4 * scale;
    }
    for digit in value.unsigned_abs().to_string().bytes() {
        draw_digit(fb, digit - b'0', cursor, y, scale);
        cursor += 4 * scale;
    }
    cursor
}

/// Minimal built-in renderer
#[derive(Debug, Default, Clone)]
pub struct PlainRenderer;

impl PlainRenderer {
    fn draw_weather_glyph(fb: &mut Framebuffer, forecast: WeatherType, x: usize, y: usize) {
        match forecast {
            WeatherType::Sunny => fb.fill_rect(x + 4, y + 4, 8, 8, true),
            WeatherType::Cloudy => fb.fill_rect(x, y + 6, 16, 6, true),
            WeatherType::Fog => {
                for line in 0..4 {
                    fb.fill_rect(x, y + 2 + line * 4, 16, 1, true);
                }
            }
            WeatherType::Rain | WeatherType::Thunderstorm | WeatherType::Snow => {
                fb.fill_rect(x, y, 16, 6, true);
                for drop in 0..4 {
                    fb.fill_rect(x + 1 + drop * 4, y + 9, 2, 4, true);
                }
                if forecast == WeatherType::Thunderstorm {
                    fb.fill_rect(x + 7, y + 6, 2, 10, true);
                }
            }
            WeatherType::Unknown => fb.fill_rect(x + 6, y + 12, 4, 4, true),
        }
    }
}

impl Renderer for PlainRenderer {
    fn render_idle(&mut self, overlay: &IdleOverlay, fb: &mut Framebuffer) {
        fb.clear(false);

        let mut y = SYSTEM_AREA_HEIGHT + 2;
        if let Some(weather) = &overlay.weather {
            Self::draw_weather_glyph(fb, weather.forecast, 2, y);
            draw_number(fb, weather.temperature as i64, 24, y + 3, 2);
            y += 20;
        }

        for kind in NotificationKind::ALL {
            if kind == NotificationKind::Weather {
                continue;
            }
            let count = overlay.count(kind);
            if count == 0 {
                continue;
            }
            // One tick mark per kind, then the count
            fb.fill_rect(2, y, 4 + kind.index() * 2, 5, true);
            draw_number(fb, count as i64, 20, y, 1);
            y += 7;
        }
    }

    fn render_notification(&mut self, notification: &NotificationSummary, fb: &mut Framebuffer) {
        fb.clear(false);
        fb.fill_rect(0, 0, SCREEN_WIDTH, 2, true);
        fb.fill_rect(4, 8, 4 + notification.kind.index() * 4, 8, true);
        if notification.count > 1 {
            draw_number(fb, notification.count as i64, 60, 8, 2);
        }
        if notification.kind == NotificationKind::Weather {
            if let Some(weather) = &notification.weather {
                Self::draw_weather_glyph(fb, weather.forecast, 4, 30);
            }
        }
    }
}
