//! InfluxDB v2 sink for sensor readings.

use std::fmt::Write as _;
use std::time::Duration;

use aht21_influx::Reading;
use chrono::{DateTime, FixedOffset};
use reqwest::{StatusCode, Url};

use crate::config::InfluxConfig;

const MEASUREMENT: &str = "sensor_data";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Value of the `sensor` tag on every point. Needs no line-protocol escaping.
const SENSOR_MODEL: &str = "AHT21B";

/// Possible errors when writing to InfluxDB.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The configured base URL does not form a valid write endpoint.
    #[error("invalid InfluxDB URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Building the client or sending the request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("InfluxDB returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// A reading stamped with the local time it was taken at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    /// The decoded measurement.
    pub reading: Reading,
    /// When the measurement completed, in the configured timezone.
    pub timestamp: DateTime<FixedOffset>,
}

impl DataPoint {
    /// Creates a point for `reading` taken at `timestamp`.
    pub fn new(reading: Reading, timestamp: DateTime<FixedOffset>) -> Self {
        Self { reading, timestamp }
    }

    /// Encodes the point as one line of InfluxDB line protocol with a nanosecond timestamp.
    ///
    /// The timestamp is left out when it cannot be represented in nanoseconds,
    /// in which case the server assigns its own.
    pub fn to_line_protocol(&self) -> String {
        let Reading {
            temperature,
            relative_humidity: humidity,
        } = self.reading;

        let mut line = format!(
            "{MEASUREMENT},sensor={SENSOR_MODEL} temperature={temperature},humidity={humidity}"
        );
        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            let _ = write!(line, " {nanos}");
        }
        line
    }
}

/// Destination for data points.
pub trait Sink: Clone + Send + Sync + 'static {
    /// Writes one point. Called from a task of its own, so it must be `Send`.
    fn write(&self, point: DataPoint) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Writes points through the InfluxDB v2 HTTP write API.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: Url,
    authorization: String,
}

impl InfluxSink {
    /// Creates a sink writing to the bucket described by `config`.
    ///
    /// Fails if the URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("aht21-influx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            write_url: write_url(config)?,
            authorization: format!("Token {}", config.token),
        })
    }
}

impl Sink for InfluxSink {
    async fn write(&self, point: DataPoint) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.write_url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point.to_line_protocol())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }

        Ok(())
    }
}

/// Builds `{url}/api/v2/write?org=..&bucket=..&precision=ns`.
fn write_url(config: &InfluxConfig) -> Result<Url, SinkError> {
    let base = format!("{}/api/v2/write", config.url.trim_end_matches('/'));
    Url::parse_with_params(
        &base,
        &[
            ("org", config.org.as_str()),
            ("bucket", config.bucket.as_str()),
            ("precision", "ns"),
        ],
    )
    .map_err(|e| SinkError::InvalidUrl {
        url: config.url.clone(),
        reason: e.to_string(),
    })
}
