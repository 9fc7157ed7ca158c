//! Link transport module
//!
//! This module owns the byte-stream connection to an accessory: opening it
//! through a [`Connector`], framing it with the accessory codec and
//! reporting connection state changes as [`LinkEvent`]s.

mod link;
#[cfg(target_os = "linux")]
mod rfcomm;

pub use self::link::{
    boxed, Connector, DynConnector, Link, LinkEvent, LinkStream, DEFAULT_CONNECT_TIMEOUT,
};
#[cfg(target_os = "linux")]
pub use self::rfcomm::{RfcommConnector, RfcommStream};
