//! Micro-window RMS estimation

use embedded_hal_async::delay::DelayNs;

use crate::config::SamplingConfig;
use crate::sensors::{AdcSource, CurrentSensor, SensorError};

/// Running sum of squares for a burst of instantaneous currents.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SquareAccumulator {
    sum_of_squares: f64,
    count: u32,
}

impl SquareAccumulator {
    pub const fn new() -> Self {
        Self {
            sum_of_squares: 0.0,
            count: 0,
        }
    }

    pub fn push(&mut self, amps: f64) {
        self.sum_of_squares += amps * amps;
        self.count += 1;
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    /// `sqrt(sum / count)`, or 0.0 for an empty burst.
    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        libm::fabs(libm::sqrt(self.sum_of_squares / f64::from(self.count)))
    }
}

/// Shape of one micro-window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmsEstimator {
    sample_count: u32,
    inter_sample_delay_us: u32,
}

impl RmsEstimator {
    pub const fn new(sample_count: u32, inter_sample_delay_us: u32) -> Self {
        Self {
            sample_count,
            inter_sample_delay_us,
        }
    }

    pub const fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.rms_samples, config.rms_spacing_us)
    }

    /// Read `sample_count` instantaneous currents, each followed by the
    /// inter-sample delay, and reduce them to one RMS value.
    ///
    /// A failing hardware read aborts the burst.
    pub async fn estimate<A, D>(
        &self,
        sensor: &mut CurrentSensor<A>,
        delay: &mut D,
    ) -> Result<f64, SensorError>
    where
        A: AdcSource,
        D: DelayNs,
    {
        let mut acc = SquareAccumulator::new();
        for _ in 0..self.sample_count {
            acc.push(sensor.read_instantaneous_current().await?);
            delay.delay_us(self.inter_sample_delay_us).await;
        }
        Ok(acc.rms())
    }
}

/// Anything that can produce one RMS current value on demand.
///
/// The aggregation window only depends on this trait, so it can be driven by
/// the real sensor ([`RmsSampler`]) or by precomputed values.
pub trait RmsSource {
    fn measure_rms<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> impl Future<Output = Result<f64, SensorError>>;
}

/// A current sensor paired with its micro-window shape.
pub struct RmsSampler<A> {
    sensor: CurrentSensor<A>,
    estimator: RmsEstimator,
}

impl<A: AdcSource> RmsSampler<A> {
    pub fn new(sensor: CurrentSensor<A>, estimator: RmsEstimator) -> Self {
        Self { sensor, estimator }
    }
}

impl<A: AdcSource> RmsSource for RmsSampler<A> {
    async fn measure_rms<D: DelayNs>(&mut self, delay: &mut D) -> Result<f64, SensorError> {
        self.estimator.estimate(&mut self.sensor, delay).await
    }
}
