//! Protocol implementation module
//!
//! This module defines the accessory's framed messages, their checksum and
//! codec, the display buffers, and the device session state machine that
//! drives one accessory.

pub mod codec;
pub mod crc;
pub mod framebuffer;
pub mod message;
pub mod render;
pub mod session;
pub mod watch;

pub use self::codec::{encode_frame, verify_frame, WatchCodec};
pub use self::framebuffer::Framebuffer;
pub use self::message::{BatteryStatus, ButtonPress, DeviceType, Message, MessageType};
pub use self::render::{IdleOverlay, PlainRenderer, Renderer};
pub use self::session::{DeviceSession, SessionAction, SessionConfig, SessionStatus};
pub use self::watch::{NotificationSummary, Watch, WatchEvent};

// Constants
/// First byte of every frame
pub const FRAME_START: u8 = 0x01;

/// Start, length, type, options and the two checksum bytes
pub const FRAME_OVERHEAD: usize = 6;

/// Largest frame the accessory accepts
pub const MAX_FRAME_SIZE: usize = 32;

/// Largest payload that fits in one frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - FRAME_OVERHEAD;
