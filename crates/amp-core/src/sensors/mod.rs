//! Analog current sensor front-end
//!
//! The [`AdcSource`] trait is the hardware seam: the firmware implements it
//! on top of the ESP32 ADC, tests implement it with scripted raw values.
//! [`CurrentSensor`] is the sample reader that turns one raw reading into
//! amperes with the configured transfer function.

use thiserror_no_std::Error;

use crate::config::SensorConfig;

/// Full-scale value of the 12-bit ADC.
pub const ADC_MAX_RAW: u16 = 4095;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} read failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("RMS of {milliamps} mA is outside the plausibility range")]
    OutOfRange { milliamps: i64 },
}

/// Source of quantized analog readings.
pub trait AdcSource {
    /// Perform one conversion and return the raw value (0..=4095).
    fn read_raw(&mut self) -> impl Future<Output = Result<u16, SensorError>>;
}

/// Sample reader: one hardware read, one calibrated current value.
pub struct CurrentSensor<A> {
    adc: A,
    calibration: SensorConfig,
}

impl<A: AdcSource> CurrentSensor<A> {
    pub fn new(adc: A, calibration: SensorConfig) -> Self {
        Self { adc, calibration }
    }

    /// Read one instantaneous current value in amperes.
    pub async fn read_instantaneous_current(&mut self) -> Result<f64, SensorError> {
        let raw = self.adc.read_raw().await?;
        Ok(self.calibration.current_from_raw(raw))
    }
}
