use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::serde::{deserialize_secs, serialize_secs};
use crate::core::{
    BdAddr, Error, Result, DEFAULT_RFCOMM_CHANNEL, DEFAULT_STALE_THRESHOLD_SECS,
};
use crate::protocol::SessionConfig;

fn default_stale_threshold() -> Duration {
    Duration::from_secs(DEFAULT_STALE_THRESHOLD_SECS)
}

fn default_channel() -> u8 {
    DEFAULT_RFCOMM_CHANNEL
}

fn default_notification_timeout() -> u8 {
    15
}

fn default_pacing_interval_ms() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Daemon configuration, read once at start-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Notifications older than this are recorded but not shown
    #[serde(
        default = "default_stale_threshold",
        serialize_with = "serialize_secs",
        deserialize_with = "deserialize_secs"
    )]
    pub stale_threshold: Duration,
    /// Configured accessories
    #[serde(default)]
    pub watches: Vec<WatchConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            stale_threshold: default_stale_threshold(),
            watches: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Parses a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Reads and parses a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// `$XDG_CONFIG_HOME/wristd/config.toml`, or under `~/.config`
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("wristd").join("config.toml")
    }
}

/// One configured accessory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Driver id in the registry
    pub driver: String,
    /// Bluetooth address, `AA:BB:CC:DD:EE:FF`
    pub address: String,
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Logical button that skips notifications and cycles watchlets
    #[serde(default)]
    pub next_watchlet_button: Option<String>,
    /// Watchlet ids, in cycling order
    #[serde(default)]
    pub watchlets: Vec<String>,
    /// Seconds a notification stays on screen
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout: u8,
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,
    #[serde(default = "default_true")]
    pub twenty_four_hour: bool,
    #[serde(default = "default_true")]
    pub day_month_order: bool,
    #[serde(default)]
    pub invert_idle: bool,
    #[serde(default)]
    pub invert_notifications: bool,
    #[serde(default)]
    pub invert_applications: bool,
    /// Per-watch override of the daemon's stale threshold, in seconds
    #[serde(default)]
    pub stale_threshold: Option<u64>,
    /// Notification providers feeding this watch
    #[serde(default)]
    pub notifications: Vec<ProviderConfig>,
}

impl WatchConfig {
    /// Minimal configuration for `driver` at `address`
    pub fn new(driver: impl Into<String>, address: impl Into<String>) -> Self {
        WatchConfig {
            driver: driver.into(),
            address: address.into(),
            channel: default_channel(),
            next_watchlet_button: None,
            watchlets: Vec::new(),
            notification_timeout: default_notification_timeout(),
            pacing_interval_ms: default_pacing_interval_ms(),
            twenty_four_hour: true,
            day_month_order: true,
            invert_idle: false,
            invert_notifications: false,
            invert_applications: false,
            stale_threshold: None,
            notifications: Vec::new(),
        }
    }

    pub fn bd_addr(&self) -> Result<BdAddr> {
        self.address.parse()
    }

    /// Effective stale threshold given the daemon-wide default
    pub fn stale_threshold_or(&self, default: Duration) -> Duration {
        self.stale_threshold.map_or(default, Duration::from_secs)
    }

    /// Session settings derived from this watch's options
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            pacing_interval: Duration::from_millis(self.pacing_interval_ms),
            notification_timeout_secs: self.notification_timeout,
            twenty_four_hour: self.twenty_four_hour,
            day_month_order: self.day_month_order,
            invert_idle: self.invert_idle,
            invert_notifications: self.invert_notifications,
            invert_applications: self.invert_applications,
            ..SessionConfig::default()
        }
    }
}

/// One notification provider binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider id in the registry
    pub provider: String,
    /// Provider-specific options
    #[serde(flatten)]
    pub options: toml::Table,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        ProviderConfig {
            provider: provider.into(),
            options: toml::Table::new(),
        }
    }

    /// Required string option
    pub fn string(&self, key: &str) -> Result<&str> {
        self.options
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::config(format!("provider {} needs a string option {:?}", self.provider, key))
            })
    }

    /// Optional integer option
    pub fn integer(&self, key: &str) -> Result<Option<i64>> {
        match self.options.get(key) {
            None => Ok(None),
            Some(value) => value.as_integer().map(Some).ok_or_else(|| {
                Error::config(format!("provider {} option {:?} must be an integer", self.provider, key))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
stale_threshold = 600

[[watches]]
driver = "metawatch-digital"
address = "D0:37:61:C4:5E:01"
next_watchlet_button = "C"
watchlets = ["clock"]
invert_notifications = true

[[watches.notifications]]
provider = "weather-file"
path = "/tmp/weather.toml"
interval = 120

[[watches]]
driver = "metawatch-digital"
address = "D0:37:61:C4:5E:02"
channel = 2
stale_threshold = 60
"#;

    #[test]
    fn test_parse_sample() {
        let config = DaemonConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.stale_threshold, Duration::from_secs(600));
        assert_eq!(config.watches.len(), 2);

        let first = &config.watches[0];
        assert_eq!(first.channel, DEFAULT_RFCOMM_CHANNEL);
        assert_eq!(first.next_watchlet_button.as_deref(), Some("C"));
        assert_eq!(first.notification_timeout, 15);
        assert!(first.twenty_four_hour);
        assert_eq!(first.bd_addr().unwrap().to_string(), "D0:37:61:C4:5E:01");
        assert_eq!(first.stale_threshold_or(config.stale_threshold), Duration::from_secs(600));

        let provider = &first.notifications[0];
        assert_eq!(provider.provider, "weather-file");
        assert_eq!(provider.string("path").unwrap(), "/tmp/weather.toml");
        assert_eq!(provider.integer("interval").unwrap(), Some(120));
        assert!(provider.string("missing").is_err());
        assert!(provider.integer("path").is_err());

        let session = first.session_config();
        assert!(session.invert_notifications);
        assert_eq!(session.pacing_interval, Duration::from_millis(30));

        let second = &config.watches[1];
        assert_eq!(second.channel, 2);
        assert_eq!(second.stale_threshold_or(config.stale_threshold), Duration::from_secs(60));
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.stale_threshold, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            DaemonConfig::from_toml("[[watches]]\naddress = \"00:11:22:33:44:55\""),
            Err(Error::Config(_))
        ));
        assert!(DaemonConfig::load(Path::new("/nonexistent/wristd.toml")).is_err());
    }

    #[test]
    fn test_bad_address_is_config_error() {
        let watch = WatchConfig::new("metawatch-digital", "not-an-address");
        assert!(matches!(watch.bd_addr(), Err(Error::Config(_))));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = DaemonConfig::default();
        config.watches.push(WatchConfig::new("metawatch-digital", "00:11:22:33:44:55"));
        let text = toml::to_string(&config).unwrap();
        assert_eq!(DaemonConfig::from_toml(&text).unwrap(), config);
    }
}
