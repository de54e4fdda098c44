use core::fmt;

/// Possible errors from the AHT21 driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum AhtError<E> {
    /// The trigger command could not be written to the sensor.
    Command(E),
    /// The 6-byte measurement response could not be read.
    Read(E),
    /// The status byte reported a conversion still in progress.
    Busy,
}

impl<E: fmt::Debug> fmt::Display for AhtError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "failed to write command: {e:?}"),
            Self::Read(e) => write!(f, "failed to read data: {e:?}"),
            Self::Busy => f.write_str("sensor is busy"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for AhtError<E> {}
