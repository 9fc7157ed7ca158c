//! Weather reports read from a TOML file another program keeps current.
//!
//! ```toml
//! location = "Barcelona"
//! code = 3            # AccuWeather icon code
//! temperature = 24
//! metric = true
//! updated = 1700000000
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::serde::deserialize_unix_time;
use crate::core::{
    describe_accuweather_code, Error, Result, TemperatureUnit, WeatherReport, WeatherType,
};
use crate::daemon::config::ProviderConfig;
use crate::daemon::registry::NotificationProvider;
use crate::server::{BasicNotification, Notification, NotificationSink};

pub const ID: &str = "weather-file";

const DEFAULT_POLL_SECS: u64 = 60;

fn default_metric() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct WeatherFile {
    location: String,
    code: i32,
    temperature: i32,
    #[serde(default = "default_metric")]
    metric: bool,
    #[serde(deserialize_with = "deserialize_unix_time")]
    updated: DateTime<Utc>,
}

impl WeatherFile {
    fn report(&self) -> WeatherReport {
        WeatherReport {
            location: self.location.clone(),
            forecast: WeatherType::from_accuweather_code(self.code),
            temperature: self.temperature,
            unit: if self.metric {
                TemperatureUnit::Celsius
            } else {
                TemperatureUnit::Fahrenheit
            },
        }
    }
}

async fn read_weather_file(path: &Path) -> Result<WeatherFile> {
    let text = tokio::fs::read_to_string(path).await?;
    toml::from_str(&text).map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
}

/// Polls a weather file and keeps one weather notification current
#[derive(Debug, Clone)]
pub struct WeatherFileProvider {
    path: PathBuf,
    interval: Duration,
}

impl WeatherFileProvider {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        WeatherFileProvider {
            path: path.into(),
            interval,
        }
    }

    /// Reads the file once and brings the notification up to date.
    ///
    /// A newer report replaces the previous notification, which is dismissed.
    async fn refresh(
        &self,
        sink: &NotificationSink,
        current: &mut Option<Arc<BasicNotification>>,
        last_error: &mut Option<String>,
    ) {
        let file = match read_weather_file(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                let message = e.to_string();
                if last_error.as_deref() != Some(message.as_str()) {
                    warn!(path = %self.path.display(), error = %message, "cannot read weather file");
                } else {
                    debug!(path = %self.path.display(), error = %message, "weather file still unreadable");
                }
                *last_error = Some(message);
                return;
            }
        };
        *last_error = None;

        if current.as_ref().map_or(false, |n| n.timestamp() >= file.updated) {
            return;
        }

        info!(location = %file.location, code = file.code, "weather updated");
        let notification = BasicNotification::weather_report(
            sink.clone(),
            file.updated,
            file.report(),
            describe_accuweather_code(file.code),
        );
        notification.post();
        // The new report already owns the weather slot when the old one goes
        if let Some(previous) = current.replace(notification) {
            previous.dismiss();
        }
    }

    async fn poll(self, sink: NotificationSink) {
        let mut current = None;
        let mut last_error = None;
        loop {
            self.refresh(&sink, &mut current, &mut last_error).await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

impl NotificationProvider for WeatherFileProvider {
    fn id(&self) -> &str {
        ID
    }

    fn run(self: Box<Self>, sink: NotificationSink) -> BoxFuture<'static, ()> {
        Box::pin((*self).poll(sink))
    }
}

pub fn create(config: &ProviderConfig) -> Result<Box<dyn NotificationProvider>> {
    let path = config.string("path")?;
    let interval = match config.integer("interval")? {
        Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
        Some(secs) => {
            return Err(Error::config(format!("weather-file interval must be positive, got {}", secs)))
        }
        None => Duration::from_secs(DEFAULT_POLL_SECS),
    };
    Ok(Box::new(WeatherFileProvider::new(path, interval)))
}
