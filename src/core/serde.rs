use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes Duration as whole seconds
pub fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs().serialize(serializer)
}

/// Deserializes Duration from whole seconds
pub fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Serializes Duration as whole milliseconds
pub fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    (duration.as_millis() as u64).serialize(serializer)
}

/// Deserializes Duration from whole milliseconds
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Serializes a timestamp as seconds since UNIX_EPOCH
pub fn serialize_unix_time<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    time.timestamp().serialize(serializer)
}

/// Deserializes a timestamp from seconds since UNIX_EPOCH
pub fn deserialize_unix_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = i64::deserialize(deserializer)?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Test {
        #[serde(serialize_with = "serialize_secs")]
        #[serde(deserialize_with = "deserialize_secs")]
        threshold: Duration,
        #[serde(serialize_with = "serialize_millis")]
        #[serde(deserialize_with = "deserialize_millis")]
        pacing: Duration,
        #[serde(serialize_with = "serialize_unix_time")]
        #[serde(deserialize_with = "deserialize_unix_time")]
        updated: DateTime<Utc>,
    }

    #[test]
    fn test_duration_fields() {
        let parsed: Test = toml::from_str("threshold = 300\npacing = 30\nupdated = 1700000000\n").unwrap();
        assert_eq!(parsed.threshold, Duration::from_secs(300));
        assert_eq!(parsed.pacing, Duration::from_millis(30));
        assert_eq!(parsed.updated.timestamp(), 1_700_000_000);

        let text = toml::to_string(&parsed).unwrap();
        assert!(text.contains("threshold = 300"));
        assert!(text.contains("pacing = 30"));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let parsed: Result<Test, _> = toml::from_str("threshold = -1\npacing = 30\nupdated = 0\n");
        assert!(parsed.is_err());
    }
}
