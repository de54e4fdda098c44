use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::error::AhtError;

/// Fixed 7-bit I2C address of the AHT21.
pub const ADDRESS: u8 = 0x38;

/// Trigger-measurement opcode followed by its two parameter bytes.
pub const TRIGGER_MEASUREMENT: [u8; 3] = [0xAC, 0x33, 0x00];

/// Minimum conversion time (in milliseconds) between the trigger and the read.
pub const SETTLE_TIME_MS: u32 = 80;

/// Status bit set while the sensor is still converting.
const STATUS_BUSY: u8 = 0x80;

/// Full scale of the 20-bit raw fields (2^20).
const RAW_FULL_SCALE: f32 = 1_048_576.0;

/// Driver for the AHT21 temperature and humidity sensor.
pub struct Aht21<I2C, D> {
    i2c: I2C,
    delay: D,
}

/// Reading returned by the AHT21 sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent. Not clamped to 0..=100.
    pub relative_humidity: f32,
}

impl<I2C, DELAY, E> Aht21<I2C, DELAY>
where
    I2C: I2c<Error = E>,
    DELAY: DelayNs,
{
    /// Creates a new instance of the AHT21 driver.
    ///
    /// # Arguments
    ///
    /// * `i2c` - The I2C bus the sensor is attached to at [`ADDRESS`].
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Aht21 { i2c, delay }
    }

    /// Destroys the driver and hands back the bus and delay provider.
    pub fn release(self) -> (I2C, DELAY) {
        (self.i2c, self.delay)
    }

    /// Reads a temperature and humidity measurement from the AHT21 sensor.
    ///
    /// This method performs one complete measurement: writing the trigger
    /// command, waiting [`SETTLE_TIME_MS`], reading the 6-byte response,
    /// checking the busy bit and decoding the result. It never retries.
    ///
    /// # Returns
    ///
    /// * `Ok(Reading)` if the sensor returned a finished measurement.
    /// * `Err(AhtError::Command)` if the trigger write failed. Nothing else is attempted.
    /// * `Err(AhtError::Read)` if the response read failed.
    /// * `Err(AhtError::Busy)` if the sensor was still converting.
    pub fn read(&mut self) -> Result<Reading, AhtError<E>> {
        self.i2c
            .write(ADDRESS, &TRIGGER_MEASUREMENT)
            .map_err(AhtError::Command)?;

        self.delay.delay_ms(SETTLE_TIME_MS);

        let mut raw = [0; 6];
        self.i2c.read(ADDRESS, &mut raw).map_err(AhtError::Read)?;

        self.decode(raw)
    }

    /// Converts the raw 6-byte response into a `Reading` struct.
    ///
    /// Byte 0 is the status byte. Humidity is the 20 bits spanning byte 1, byte 2
    /// and the upper nibble of byte 3; temperature is the lower nibble of byte 3,
    /// byte 4 and byte 5.
    fn decode(&self, raw: [u8; 6]) -> Result<Reading, AhtError<E>> {
        let [status, b1, b2, b3, b4, b5] = raw;

        if status & STATUS_BUSY != 0 {
            return Err(AhtError::Busy);
        }

        let raw_humidity = (u32::from(b1) << 12) | (u32::from(b2) << 4) | (u32::from(b3) >> 4);
        let raw_temperature = (u32::from(b3 & 0x0F) << 16) | (u32::from(b4) << 8) | u32::from(b5);

        // Both values are below 2^20, so the f32 conversion is exact.
        let relative_humidity = raw_humidity as f32 * 100.0 / RAW_FULL_SCALE;
        let temperature = raw_temperature as f32 * 200.0 / RAW_FULL_SCALE - 50.0;

        Ok(Reading {
            temperature,
            relative_humidity,
        })
    }
}
