use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Kind of a notification, used for grouping, unread counts and priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Generic,
    Email,
    Call,
    Sms,
    InstantMessage,
    Weather,
}

impl NotificationKind {
    /// All kinds, in display order
    pub const ALL: [NotificationKind; 6] = [
        NotificationKind::Generic,
        NotificationKind::Email,
        NotificationKind::Call,
        NotificationKind::Sms,
        NotificationKind::InstantMessage,
        NotificationKind::Weather,
    ];

    /// Position of this kind in [`NotificationKind::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Opaque identity of a live notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl NotificationId {
    /// Allocates a process-unique identifier
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NotificationId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What the accessory is rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Idle,
    Application,
    Notification,
}

impl Mode {
    /// All modes, indexed by their wire code
    pub const ALL: [Mode; 3] = [Mode::Idle, Mode::Application, Mode::Notification];

    /// Wire representation (low nibble of the options byte)
    pub fn code(self) -> u8 {
        match self {
            Mode::Idle => 0,
            Mode::Application => 1,
            Mode::Notification => 2,
        }
    }

    /// Parses the wire representation, ignoring the high nibble
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0x0f {
            0 => Some(Mode::Idle),
            1 => Some(Mode::Application),
            2 => Some(Mode::Notification),
            _ => None,
        }
    }
}

/// Link state as owned by the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// A connection attempt is in flight; `attempt` counts from 1
    Connecting { attempt: usize },
    Connected,
}

/// A Bluetooth device address
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl FromStr for BdAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::config(format!("Bluetooth address too short: {}", s)))?;
            if part.len() != 2 {
                return Err(Error::config(format!("Invalid Bluetooth address: {}", s)));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| Error::config(format!("Invalid Bluetooth address: {}", s)))?;
        }
        if parts.next().is_some() {
            return Err(Error::config(format!("Bluetooth address too long: {}", s)));
        }
        Ok(BdAddr(bytes))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({})", self)
    }
}

impl Serialize for BdAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BdAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Broad weather category shown on the idle screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherType {
    Sunny,
    Cloudy,
    Fog,
    Rain,
    Thunderstorm,
    Snow,
    Unknown,
}

impl WeatherType {
    /// Maps an AccuWeather icon code to its category
    pub fn from_accuweather_code(code: i32) -> Self {
        match code {
            1..=3 | 33 | 34 => WeatherType::Sunny,
            4..=8 | 35..=38 => WeatherType::Cloudy,
            11 => WeatherType::Fog,
            12..=14 | 18 | 26 | 39 | 40 => WeatherType::Rain,
            15..=17 | 41 | 42 => WeatherType::Thunderstorm,
            19..=25 | 29 | 43 | 44 => WeatherType::Snow,
            _ => WeatherType::Unknown,
        }
    }
}

/// Human readable description of an AccuWeather icon code
pub fn describe_accuweather_code(code: i32) -> String {
    let text = match code {
        1 | 2 => "Sunny",
        3..=5 | 35 => "Partly cloudy",
        6 | 36 | 37 => "Mostly cloudy",
        7 | 8 | 38 => "Cloudy",
        11 => "Fog",
        12 | 39 | 40 => "Light rain",
        13 | 14 => "Light rain with sun",
        18 | 26 => "Heavy rain",
        15 | 16 | 41 | 42 => "Thunderstorm",
        17 => "Thunderstorm with sun",
        19 | 43 => "Light snow",
        20 | 21 => "Light snow with sun",
        22 | 44 => "Heavy snow",
        29 => "Heavy rain and snow",
        25 => "Blizzard",
        30 => "Hot",
        31 => "Cold",
        32 => "Wind",
        33 | 34 => "Clear",
        _ => return format!("? {}", code),
    };
    text.to_string()
}

/// Temperature scale of a weather report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Weather summary carried by weather-kind notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Location the report is for
    pub location: String,
    /// Forecast category
    pub forecast: WeatherType,
    /// Current temperature
    pub temperature: i32,
    /// Scale of `temperature`
    pub unit: TemperatureUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_codes() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(Mode::from_code(0x12), Some(Mode::Notification));
        assert_eq!(Mode::from_code(3), None);
    }

    #[test]
    fn test_bdaddr_parse() {
        let addr: BdAddr = "00:1A:7d:DA:71:13".parse().unwrap();
        assert_eq!(addr.0, [0x00, 0x1a, 0x7d, 0xda, 0x71, 0x13]);
        assert_eq!(addr.to_string(), "00:1A:7D:DA:71:13");

        assert!("00:1A:7D:DA:71".parse::<BdAddr>().is_err());
        assert!("00:1A:7D:DA:71:13:00".parse::<BdAddr>().is_err());
        assert!("00:1A:7D:DA:71:GG".parse::<BdAddr>().is_err());
        assert!("001A:7D:DA:71:13".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_weather_categories() {
        assert_eq!(WeatherType::from_accuweather_code(1), WeatherType::Sunny);
        assert_eq!(WeatherType::from_accuweather_code(33), WeatherType::Sunny);
        assert_eq!(WeatherType::from_accuweather_code(6), WeatherType::Cloudy);
        assert_eq!(WeatherType::from_accuweather_code(18), WeatherType::Rain);
        assert_eq!(WeatherType::from_accuweather_code(22), WeatherType::Snow);
        assert_eq!(WeatherType::from_accuweather_code(30), WeatherType::Unknown);
    }

    #[test]
    fn test_weather_descriptions() {
        assert_eq!(describe_accuweather_code(2), "Sunny");
        assert_eq!(describe_accuweather_code(34), "Clear");
        assert_eq!(describe_accuweather_code(99), "? 99");
    }

    #[test]
    fn test_kind_index() {
        for (i, kind) in NotificationKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
