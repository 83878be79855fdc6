//! Macro-window aggregation

use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

use super::rms::RmsSource;
use crate::config::{SamplingConfig, SensorConfig};
use crate::error::WindowError;
use crate::reading::AggregatedReading;
use crate::sensors::SensorError;

/// Half-open range `[min, max)` of physically plausible RMS currents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibilityRange {
    pub min_amps: f64,
    pub max_amps: f64,
}

impl PlausibilityRange {
    pub const fn new(min_amps: f64, max_amps: f64) -> Self {
        Self { min_amps, max_amps }
    }

    /// NaN is never plausible.
    pub fn contains(&self, amps: f64) -> bool {
        amps >= self.min_amps && amps < self.max_amps
    }

    /// Accept an RMS value or explain why it was rejected.
    pub fn check(&self, amps: f64) -> Result<f64, SensorError> {
        if self.contains(amps) {
            Ok(amps)
        } else {
            Err(SensorError::OutOfRange {
                milliamps: libm::round(amps * 1000.0) as i64,
            })
        }
    }
}

/// Running sum and counters for one macro-window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAccumulator {
    range: PlausibilityRange,
    sum_amps: f64,
    valid: u32,
    seen: u32,
}

impl WindowAccumulator {
    pub const fn new(range: PlausibilityRange) -> Self {
        Self {
            range,
            sum_amps: 0.0,
            valid: 0,
            seen: 0,
        }
    }

    /// Offer one RMS value. Returns whether it was counted.
    pub fn offer(&mut self, amps: f64) -> bool {
        self.seen += 1;
        match self.range.check(amps) {
            Ok(amps) => {
                self.sum_amps += amps;
                self.valid += 1;
                true
            }
            Err(e) => {
                debug!("Dropping sample {}: {}", self.seen, e);
                false
            }
        }
    }

    /// Record a sample slot whose RMS could not be measured at all.
    pub fn skip(&mut self) {
        self.seen += 1;
    }

    pub const fn valid(&self) -> u32 {
        self.valid
    }

    pub const fn seen(&self) -> u32 {
        self.seen
    }

    /// Reduce the window to a reading, or `NoValidSamples`.
    pub fn finish(
        &self,
        total_sample_count: u32,
        nominal_voltage: f64,
    ) -> Result<AggregatedReading, WindowError> {
        if self.valid == 0 {
            return Err(WindowError::NoValidSamples {
                total: total_sample_count,
            });
        }
        let average = self.sum_amps / f64::from(self.valid);
        Ok(AggregatedReading::new(
            average,
            nominal_voltage,
            self.valid,
            total_sample_count,
        ))
    }
}

/// Shape of one macro-window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationWindow {
    window_size: u32,
    sample_interval_ms: u32,
    range: PlausibilityRange,
    nominal_voltage: f64,
    progress_every: u32,
}

impl AggregationWindow {
    pub const fn new(
        window_size: u32,
        sample_interval_ms: u32,
        range: PlausibilityRange,
        nominal_voltage: f64,
    ) -> Self {
        Self {
            window_size,
            sample_interval_ms,
            range,
            nominal_voltage,
            progress_every: 0,
        }
    }

    pub const fn from_config(sampling: &SamplingConfig, sensor: &SensorConfig) -> Self {
        Self {
            window_size: sampling.window_samples,
            sample_interval_ms: sampling.window_interval_ms,
            range: PlausibilityRange::new(
                sampling.plausible_min_amps,
                sampling.plausible_max_amps,
            ),
            nominal_voltage: sensor.nominal_voltage,
            progress_every: sampling.progress_every,
        }
    }

    pub const fn with_progress_every(mut self, every: u32) -> Self {
        self.progress_every = every;
        self
    }

    pub const fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Take `window_size` RMS values, one per `sample_interval`, and reduce
    /// them to an [`AggregatedReading`].
    ///
    /// Runs to completion once started. Out-of-range values and failed
    /// measurements are dropped without aborting the window.
    pub async fn aggregate<S, D>(
        &self,
        source: &mut S,
        delay: &mut D,
    ) -> Result<AggregatedReading, WindowError>
    where
        S: RmsSource,
        D: DelayNs,
    {
        let mut acc = WindowAccumulator::new(self.range);

        for i in 1..=self.window_size {
            match source.measure_rms(delay).await {
                Ok(amps) => {
                    acc.offer(amps);
                }
                Err(e) => {
                    warn!("RMS measurement {} failed: {}", i, e);
                    acc.skip();
                }
            }

            if self.progress_every != 0 && i % self.progress_every == 0 {
                info!(
                    "  [{}/{}] progress: {:.1}%",
                    i,
                    self.window_size,
                    f64::from(i) * 100.0 / f64::from(self.window_size)
                );
            }

            delay.delay_ms(self.sample_interval_ms).await;
        }

        acc.finish(self.window_size, self.nominal_voltage)
    }
}
