//! AHT21 Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic driver for the AHT21 (AHT21B) temperature
//! and humidity sensor, built on top of the [`embedded-hal`] traits.
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits
//! - Designed for `no_std` environments
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! This driver depends on the following `embedded-hal` traits:
//! - [`I2c`] for the bus transactions with the sensor
//! - [`DelayNs`] for the measurement settle time
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` for logging support
//! - `daemon` (default): builds the `aht21-influx` binary, which polls a sensor on a
//!   Linux I2C bus and writes every reading to InfluxDB
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`I2c`]: embedded_hal::i2c::I2c
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod aht21;
pub mod error;

pub use aht21::{ADDRESS, Aht21, Reading, SETTLE_TIME_MS, TRIGGER_MEASUREMENT};
pub use error::AhtError;
