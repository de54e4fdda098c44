//! Runtime configuration read from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;

const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_ORG: &str = "lemolatoon";
const DEFAULT_BUCKET: &str = "sensor-home";
const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
const DEFAULT_I2C_DEVICE: &str = "/dev/i2c-1";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// UTC+09:00, used when the configured zone cannot be resolved.
const FALLBACK_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Connection details for the InfluxDB v2 write API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxConfig {
    /// Base URL of the server, e.g. `http://localhost:8086`.
    pub url: String,
    /// API token sent in the `Authorization` header.
    pub token: String,
    /// Organization the bucket belongs to.
    pub org: String,
    /// Bucket points are written to.
    pub bucket: String,
}

/// Timezone readings are stamped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// An IANA zone from the tz database, with daylight saving rules.
    Named(Tz),
    /// A constant offset from UTC.
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Resolves an IANA name such as `Asia/Tokyo` or a fixed offset such as `+09:00`.
    ///
    /// Unknown values fall back to a fixed UTC+09:00 offset.
    pub fn parse(value: &str) -> Self {
        if let Ok(tz) = value.parse::<Tz>() {
            return Self::Named(tz);
        }
        if let Ok(offset) = value.parse::<FixedOffset>() {
            return Self::Fixed(offset);
        }

        tracing::warn!(
            timezone = value,
            "Unknown timezone, falling back to UTC+09:00"
        );
        Self::fallback()
    }

    fn fallback() -> Self {
        Self::Fixed(FixedOffset::east_opt(FALLBACK_OFFSET_SECS).unwrap_or(Utc.fix()))
    }

    /// Converts an instant into this zone.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            Self::Fixed(offset) => instant.with_timezone(offset),
        }
    }

    /// The current wall-clock time in this zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.localize(Utc::now())
    }
}

/// Everything the daemon needs at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub influx: InfluxConfig,
    /// Pause between the end of one measurement and the start of the next.
    pub poll_interval: Duration,
    pub timezone: LocalZone,
    /// Linux I2C character device the sensor is attached to.
    pub i2c_device: PathBuf,
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Only a missing `INFLUXDB_TOKEN` is an error; every other variable has a default.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(token) = lookup("INFLUXDB_TOKEN").filter(|t| !t.is_empty()) else {
            bail!("INFLUXDB_TOKEN not set");
        };

        let or_default = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let influx = InfluxConfig {
            url: or_default("INFLUXDB_URL", DEFAULT_URL),
            token,
            org: or_default("INFLUXDB_ORG", DEFAULT_ORG),
            bucket: or_default("INFLUXDB_BUCKET", DEFAULT_BUCKET),
        };

        Ok(Self {
            influx,
            poll_interval: parse_poll_interval(lookup("SLEEP_DURATION_SECONDS").as_deref()),
            timezone: LocalZone::parse(&or_default("SENSOR_TIMEZONE", DEFAULT_TIMEZONE)),
            i2c_device: PathBuf::from(or_default("I2C_DEVICE", DEFAULT_I2C_DEVICE)),
        })
    }
}

/// Parses the poll interval in whole seconds.
///
/// Missing, unparsable or non-positive values fall back to 60 seconds.
fn parse_poll_interval(value: Option<&str>) -> Duration {
    let default = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);

    let Some(value) = value else {
        return default;
    };

    match value.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
        Ok(secs) => {
            tracing::warn!(
                secs,
                "SLEEP_DURATION_SECONDS must be positive, defaulting to 60 seconds"
            );
            default
        }
        Err(e) => {
            tracing::warn!(
                value,
                error = %e,
                "Invalid SLEEP_DURATION_SECONDS value, defaulting to 60 seconds"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let lookup = lookup_from(&[("INFLUXDB_TOKEN", "secret")]);
        let config = Config::from_lookup(lookup).unwrap();

        assert_eq!(
            config.influx,
            InfluxConfig {
                url: "http://localhost:8086".into(),
                token: "secret".into(),
                org: "lemolatoon".into(),
                bucket: "sensor-home".into(),
            }
        );
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.timezone, LocalZone::Named(chrono_tz::Asia::Tokyo));
        assert_eq!(config.i2c_device, PathBuf::from("/dev/i2c-1"));
    }

    #[test]
    fn test_overrides() {
        let lookup = lookup_from(&[
            ("INFLUXDB_TOKEN", "secret"),
            ("INFLUXDB_URL", "https://influx.local:8086"),
            ("INFLUXDB_ORG", "home"),
            ("INFLUXDB_BUCKET", "climate"),
            ("SLEEP_DURATION_SECONDS", "15"),
            ("SENSOR_TIMEZONE", "Europe/Berlin"),
            ("I2C_DEVICE", "/dev/i2c-3"),
        ]);
        let config = Config::from_lookup(lookup).unwrap();
        let berlin = LocalZone::Named(chrono_tz::Europe::Berlin);

        assert_eq!(config.influx.url, "https://influx.local:8086");
        assert_eq!(config.influx.org, "home");
        assert_eq!(config.influx.bucket, "climate");
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.timezone, berlin);
        assert_eq!(config.i2c_device, PathBuf::from("/dev/i2c-3"));
    }

    #[test]
    fn test_missing_token() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err.to_string(), "INFLUXDB_TOKEN not set");

        let empty = lookup_from(&[("INFLUXDB_TOKEN", "")]);
        assert!(Config::from_lookup(empty).is_err());
    }

    #[test]
    fn test_poll_interval_fallbacks() {
        let sixty = Duration::from_secs(60);

        assert_eq!(parse_poll_interval(None), sixty);
        assert_eq!(parse_poll_interval(Some("abc")), sixty);
        assert_eq!(parse_poll_interval(Some("1.5")), sixty);
        assert_eq!(parse_poll_interval(Some("0")), sixty);
        assert_eq!(parse_poll_interval(Some("-30")), sixty);
        assert_eq!(parse_poll_interval(Some(" 5 ")), Duration::from_secs(5));
    }

    #[test]
    fn test_timezone_parsing() {
        assert_eq!(LocalZone::parse("UTC"), LocalZone::Named(Tz::UTC));

        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(LocalZone::parse("-05:00"), LocalZone::Fixed(minus_five));

        let plus_nine = FixedOffset::east_opt(9 * 3600).unwrap();
        let unknown = LocalZone::parse("Mars/Olympus_Mons");
        assert_eq!(unknown, LocalZone::Fixed(plus_nine));
    }

    #[test]
    fn test_localize_keeps_instant() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let local = LocalZone::Named(chrono_tz::Asia::Tokyo).localize(instant);

        assert_eq!(local.to_rfc3339(), "2024-01-01T09:00:00+09:00");
        assert_eq!(local.timestamp(), instant.timestamp());
    }
}
