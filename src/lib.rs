//! wristd: host-side daemon for a Bluetooth wrist display accessory
//!
//! The crate is layered bottom-up: `protocol` frames and interprets the
//! accessory's messages, `network` carries them over a byte stream, `server`
//! decides what is on screen, and `daemon` wires configured watches together.
pub mod core;
pub mod daemon;
pub mod network;
pub mod protocol;
pub mod server;
pub mod time;

// Re-export commonly used items
pub use crate::core::{BdAddr, Error, Result};
pub use crate::daemon::{Daemon, DaemonConfig, Registry, WatchHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
