//! The poll loop: one measurement per cycle, each good reading forwarded in the background.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use aht21_influx::{Aht21, AhtError, Reading};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use tokio::task::{JoinError, JoinHandle};

use crate::config::LocalZone;
use crate::sink::{DataPoint, Sink};

/// Drives one sensor on a fixed interval and forwards its readings to a [`Sink`].
pub struct Poller<I2C, D, S> {
    // Locked for the whole write-settle-read sequence so only one transaction is in flight.
    sensor: Arc<Mutex<Aht21<I2C, D>>>,
    sink: S,
    zone: LocalZone,
    interval: Duration,
}

impl<I2C, D, S> Poller<I2C, D, S>
where
    I2C: I2c + Send + 'static,
    I2C::Error: Send + 'static,
    D: DelayNs + Send + 'static,
    S: Sink,
{
    /// Creates a poller that owns `sensor` until [`Poller::run`] hands it back.
    ///
    /// # Arguments
    ///
    /// * `sensor` - The driver, already bound to its bus.
    /// * `sink` - Where successful readings are written.
    /// * `zone` - Timezone the readings are stamped in.
    /// * `interval` - Pause between the end of one cycle and the start of the next.
    pub fn new(sensor: Aht21<I2C, D>, sink: S, zone: LocalZone, interval: Duration) -> Self {
        Self {
            sensor: Arc::new(Mutex::new(sensor)),
            sink,
            zone,
            interval,
        }
    }

    /// Polls until `shutdown` resolves, then hands the sensor back.
    ///
    /// Shutdown is only observed between cycles; a measurement in progress always completes.
    /// No single cycle can end the loop. The only error is failing to reclaim the sensor.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<Aht21<I2C, D>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.poll_once().await;

            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        let sensor = Arc::try_unwrap(self.sensor)
            .map_err(|_| anyhow::anyhow!("sensor still borrowed at shutdown"))?;
        Ok(sensor.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs one measurement and, if it succeeded, dispatches forwarding to the sink.
    ///
    /// Failed and panicked reads are logged and yield `None`; nothing is forwarded.
    /// Returns the forwarding task so callers may await it; the poll loop does not.
    pub async fn poll_once(&self) -> Option<JoinHandle<()>> {
        let result = match self.measure().await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Sensor task panicked, retrying next cycle");
                return None;
            }
        };
        let timestamp = self.zone.now();

        match result {
            Ok(reading) => {
                tracing::info!(
                    temperature = format_args!("{:.2}", reading.temperature),
                    humidity = format_args!("{:.2}", reading.relative_humidity),
                    "Measured"
                );
                Some(self.forward(DataPoint::new(reading, timestamp)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Measurement failed, retrying next cycle");
                None
            }
        }
    }

    /// Runs the blocking read on the blocking pool.
    ///
    /// A panic inside the driver poisons the lock; later cycles take the lock over regardless.
    async fn measure(&self) -> Result<Result<Reading, AhtError<I2C::Error>>, JoinError> {
        let sensor = Arc::clone(&self.sensor);

        tokio::task::spawn_blocking(move || {
            let mut sensor = sensor.lock().unwrap_or_else(PoisonError::into_inner);
            sensor.read()
        })
        .await
    }

    /// Sends the point from an independent task. Failures are logged and dropped.
    fn forward(&self, point: DataPoint) -> JoinHandle<()> {
        let sink = self.sink.clone();

        tokio::spawn(async move {
            if let Err(e) = sink.write(point).await {
                tracing::error!(error = %e, "Error writing point");
            }
        })
    }
}
