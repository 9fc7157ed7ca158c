use crate::core::Result;
use crate::network::{boxed, RfcommConnector};
use super::config::WatchConfig;
use super::registry::Driver;

/// Digital display accessory reached over RFCOMM
pub const METAWATCH_DIGITAL: &str = "metawatch-digital";

pub fn metawatch_digital(config: &WatchConfig) -> Result<Driver> {
    Ok(Driver {
        session: config.session_config(),
        connector: boxed(RfcommConnector::new(config.channel)),
    })
}
