//! Core types and traits for the wrist display daemon
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{
    describe_accuweather_code,
    BdAddr,
    ConnectionState,
    Mode,
    NotificationId,
    NotificationKind,
    TemperatureUnit,
    WeatherReport,
    WeatherType,
};

/// Default RFCOMM channel of the accessory's serial port profile
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Notifications older than this many seconds are recorded but not shown
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 300;

/// Seconds between two clock synchronisations
pub const TIME_SYNC_INTERVAL_SECS: u64 = 24 * 3600;

/// Logical button names, in logical order
pub const BUTTON_NAMES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];
