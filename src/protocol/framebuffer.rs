//! Monochrome display buffers.
//!
//! Each display mode has its own 96×96 one-bit buffer on the accessory. The
//! host keeps a mirror of every buffer together with a copy of what was last
//! transmitted, so only rows that actually changed go over the link.

use crate::core::Mode;
use super::message::Message;

/// Screen width in pixels
pub const SCREEN_WIDTH: usize = 96;

/// Screen height in pixels
pub const SCREEN_HEIGHT: usize = 96;

/// Height of the accessory-drawn system area at the top of the idle screen
pub const SYSTEM_AREA_HEIGHT: usize = 30;

/// Bytes per display row
pub const ROW_BYTES: usize = SCREEN_WIDTH / 8;

type Row = [u8; ROW_BYTES];

/// Host-side mirror of one accessory display buffer
#[derive(Debug, Clone)]
pub struct Framebuffer {
    rows: [Row; SCREEN_HEIGHT],
    sent: [Row; SCREEN_HEIGHT],
    /// Whether `sent` reflects the accessory; false after a reconnect
    synced: bool,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// Creates a white buffer that has never been transmitted
    pub fn new() -> Self {
        Framebuffer {
            rows: [[0; ROW_BYTES]; SCREEN_HEIGHT],
            sent: [[0; ROW_BYTES]; SCREEN_HEIGHT],
            synced: false,
        }
    }

    /// Clears the buffer to white (or black)
    pub fn clear(&mut self, black: bool) {
        let fill = if black { 0xff } else { 0x00 };
        for row in self.rows.iter_mut() {
            *row = [fill; ROW_BYTES];
        }
    }

    /// Sets one pixel; out of range coordinates are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize, black: bool) {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return;
        }
        // The accessory expects the leftmost pixel in the least significant bit
        let mask = 1u8 << (x % 8);
        let byte = &mut self.rows[y][x / 8];
        if black {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Returns one pixel
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return false;
        }
        self.rows[y][x / 8] & (1 << (x % 8)) != 0
    }

    /// Fills a rectangle, clipped to the screen
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, black: bool) {
        for py in y..(y + height).min(SCREEN_HEIGHT) {
            for px in x..(x + width).min(SCREEN_WIDTH) {
                self.set_pixel(px, py, black);
            }
        }
    }

    /// Forgets what the accessory shows so the next flush resends every row
    pub fn invalidate(&mut self) {
        self.synced = false;
    }

    /// Rows that differ from what was last transmitted
    pub fn dirty_rows(&self) -> Vec<usize> {
        (0..SCREEN_HEIGHT)
            .filter(|&y| !self.synced || self.rows[y] != self.sent[y])
            .collect()
    }

    /// Produces the write messages for every dirty row at or below `first_row`
    /// and marks them as transmitted
    pub fn flush(&mut self, mode: Mode, first_row: usize) -> Vec<Message> {
        let dirty: Vec<usize> = self
            .dirty_rows()
            .into_iter()
            .filter(|&y| y >= first_row)
            .collect();

        let mut messages = Vec::with_capacity(dirty.len() / 2 + 1);
        for pair in dirty.chunks(2) {
            match *pair {
                [a, b] => messages.push(Message::write_rows(
                    mode,
                    a as u8,
                    &self.rows[a],
                    b as u8,
                    &self.rows[b],
                )),
                [a] => messages.push(Message::write_row(mode, a as u8, &self.rows[a])),
                _ => {}
            }
        }

        // Rows above `first_row` belong to the accessory; treat them as current
        for y in dirty.into_iter().chain(0..first_row.min(SCREEN_HEIGHT)) {
            self.sent[y] = self.rows[y];
        }
        self.synced = true;
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{MessageType, WRITE_SINGLE_ROW};

    #[test]
    fn test_pixels() {
        let mut fb = Framebuffer::new();
        fb.set_pixel(9, 4, true);
        assert!(fb.pixel(9, 4));
        assert!(!fb.pixel(8, 4));
        fb.set_pixel(9, 4, false);
        assert!(!fb.pixel(9, 4));
        fb.set_pixel(200, 4, true);
        assert!(!fb.pixel(200, 4));
    }

    #[test]
    fn test_first_flush_sends_everything() {
        let mut fb = Framebuffer::new();
        let messages = fb.flush(Mode::Application, 0);
        assert_eq!(messages.len(), SCREEN_HEIGHT / 2);
        assert!(messages
            .iter()
            .all(|m| m.message_type() == Some(MessageType::WriteBuffer)));
        assert!(fb.dirty_rows().is_empty());
        assert!(fb.flush(Mode::Application, 0).is_empty());
    }

    #[test]
    fn test_only_changed_rows_sent() {
        let mut fb = Framebuffer::new();
        fb.flush(Mode::Idle, 0);

        fb.fill_rect(0, 40, 8, 3, true);
        assert_eq!(fb.dirty_rows(), vec![40, 41, 42]);

        let messages = fb.flush(Mode::Idle, 0);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload[0], 40);
        assert_eq!(messages[0].payload[13], 41);
        assert_eq!(messages[1].payload[0], 42);
        assert_eq!(messages[1].options, WRITE_SINGLE_ROW);
        assert_eq!(messages[1].payload[1], 0xff);
    }

    #[test]
    fn test_invalidate_and_system_area() {
        let mut fb = Framebuffer::new();
        fb.flush(Mode::Idle, 0);
        fb.invalidate();
        let messages = fb.flush(Mode::Idle, SYSTEM_AREA_HEIGHT);
        assert_eq!(messages.len(), (SCREEN_HEIGHT - SYSTEM_AREA_HEIGHT) / 2);
        assert_eq!(messages[0].payload[0], SYSTEM_AREA_HEIGHT as u8);
        assert!(fb.dirty_rows().is_empty());
    }
}
