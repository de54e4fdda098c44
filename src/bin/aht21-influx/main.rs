//! aht21-influx: polls an AHT21 on a Linux I2C bus and writes each reading to InfluxDB.
//!
//! Configuration comes from environment variables:
//! - `INFLUXDB_TOKEN` (required)
//! - `INFLUXDB_URL` (default `http://localhost:8086`)
//! - `INFLUXDB_ORG` (default `lemolatoon`)
//! - `INFLUXDB_BUCKET` (default `sensor-home`)
//! - `SLEEP_DURATION_SECONDS` (default `60`)
//! - `SENSOR_TIMEZONE` (default `Asia/Tokyo`)
//! - `I2C_DEVICE` (default `/dev/i2c-1`)
//! - `RUST_LOG` (default `info`)

use aht21_influx::Aht21;
use anyhow::Context;
use linux_embedded_hal::{Delay, I2cdev};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod poller;
mod sink;

use config::Config;
use poller::Poller;
use sink::InfluxSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let i2c = I2cdev::new(&config.i2c_device)
        .with_context(|| format!("failed to open I2C bus {}", config.i2c_device.display()))?;
    let sink = InfluxSink::new(&config.influx).context("failed to create InfluxDB client")?;

    tracing::info!(
        device = %config.i2c_device.display(),
        url = %config.influx.url,
        org = %config.influx.org,
        bucket = %config.influx.bucket,
        interval_secs = config.poll_interval.as_secs(),
        "Starting aht21-influx"
    );

    let poller = Poller::new(
        Aht21::new(i2c, Delay),
        sink,
        config.timezone,
        config.poll_interval,
    );
    let sensor = poller.run(shutdown_signal()).await?;

    // Dropping the bus handle closes the device file.
    let (i2c, _delay) = sensor.release();
    drop(i2c);

    tracing::info!("aht21-influx stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown requested");
}
