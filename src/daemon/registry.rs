use std::collections::BTreeMap;

use futures::future::BoxFuture;

use crate::core::{Error, Result};
use crate::network::DynConnector;
use crate::protocol::SessionConfig;
use crate::server::{NotificationSink, Watchlet};
use super::config::{ProviderConfig, WatchConfig};

/// Everything needed to drive one accessory
pub struct Driver {
    pub session: SessionConfig,
    pub connector: DynConnector,
}

/// A notification source running as its own task
pub trait NotificationProvider: Send {
    fn id(&self) -> &str;

    /// Produces notifications into `sink` until the task is dropped
    fn run(self: Box<Self>, sink: NotificationSink) -> BoxFuture<'static, ()>;
}

pub type DriverFactory = fn(&WatchConfig) -> Result<Driver>;
pub type ProviderFactory = fn(&ProviderConfig) -> Result<Box<dyn NotificationProvider>>;
pub type WatchletFactory = fn() -> Box<dyn Watchlet>;

/// Drivers, notification providers and watchlets by string id.
///
/// Populated before any watch is initialised; ids are matched case
/// insensitively.
#[derive(Default)]
pub struct Registry {
    drivers: BTreeMap<String, DriverFactory>,
    providers: BTreeMap<String, ProviderFactory>,
    watchlets: BTreeMap<String, WatchletFactory>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in implementations
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        #[cfg(target_os = "linux")]
        registry.register_driver(super::drivers::METAWATCH_DIGITAL, super::drivers::metawatch_digital);
        registry.register_provider(
            super::providers::weather_file::ID,
            super::providers::weather_file::create,
        );
        registry.register_watchlet(super::watchlets::clock::ID, super::watchlets::clock::create);
        registry
    }

    pub fn register_driver(&mut self, id: &str, factory: DriverFactory) {
        self.drivers.insert(id.to_lowercase(), factory);
    }

    pub fn register_provider(&mut self, id: &str, factory: ProviderFactory) {
        self.providers.insert(id.to_lowercase(), factory);
    }

    pub fn register_watchlet(&mut self, id: &str, factory: WatchletFactory) {
        self.watchlets.insert(id.to_lowercase(), factory);
    }

    pub fn drivers(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    pub fn providers(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn watchlets(&self) -> Vec<&str> {
        self.watchlets.keys().map(String::as_str).collect()
    }

    /// Builds the driver a watch is configured with
    pub fn create_driver(&self, config: &WatchConfig) -> Result<Driver> {
        let factory = self
            .drivers
            .get(&config.driver.to_lowercase())
            .ok_or_else(|| Error::config(format!("invalid driver {:?}", config.driver)))?;
        factory(config)
    }

    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn NotificationProvider>> {
        let factory = self
            .providers
            .get(&config.provider.to_lowercase())
            .ok_or_else(|| Error::config(format!("invalid provider {:?}", config.provider)))?;
        factory(config)
    }

    pub fn create_watchlet(&self, id: &str) -> Result<Box<dyn Watchlet>> {
        let factory = self
            .watchlets
            .get(&id.to_lowercase())
            .ok_or_else(|| Error::config(format!("invalid watchlet {:?}", id)))?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.providers(), vec!["weather-file"]);
        assert_eq!(registry.watchlets(), vec!["clock"]);
        #[cfg(target_os = "linux")]
        assert_eq!(registry.drivers(), vec!["metawatch-digital"]);
    }

    #[test]
    fn test_unknown_ids_are_config_errors() {
        let registry = Registry::new();
        let watch = WatchConfig::new("pebble", "00:11:22:33:44:55");
        assert!(matches!(registry.create_driver(&watch), Err(Error::Config(_))));
        assert!(matches!(
            registry.create_provider(&ProviderConfig::new("rss")),
            Err(Error::Config(_))
        ));
        assert!(registry.create_watchlet("music").is_err());
    }

    #[test]
    fn test_ids_are_case_insensitive() {
        let registry = Registry::with_builtins();
        let watchlet = registry.create_watchlet("Clock").unwrap();
        assert_eq!(watchlet.id(), "clock");
    }
}
