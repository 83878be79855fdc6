//! The reportable product of one macro-cycle.

/// Mean current and derived power over one aggregation window.
///
/// Only produced by [`WindowAccumulator::finish`](crate::sampling::WindowAccumulator::finish)
/// with at least one valid sample, so `0 < valid_sample_count <= total_sample_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedReading {
    average_current_amps: f64,
    nominal_voltage: f64,
    average_power_watts: f64,
    valid_sample_count: u32,
    total_sample_count: u32,
}

impl AggregatedReading {
    pub(crate) fn new(
        average_current_amps: f64,
        nominal_voltage: f64,
        valid_sample_count: u32,
        total_sample_count: u32,
    ) -> Self {
        debug_assert!(valid_sample_count > 0);
        debug_assert!(valid_sample_count <= total_sample_count);
        Self {
            average_current_amps,
            nominal_voltage,
            average_power_watts: average_current_amps * nominal_voltage,
            valid_sample_count,
            total_sample_count,
        }
    }

    pub const fn average_current_amps(&self) -> f64 {
        self.average_current_amps
    }

    pub const fn nominal_voltage(&self) -> f64 {
        self.nominal_voltage
    }

    pub const fn average_power_watts(&self) -> f64 {
        self.average_power_watts
    }

    pub const fn valid_sample_count(&self) -> u32 {
        self.valid_sample_count
    }

    pub const fn total_sample_count(&self) -> u32 {
        self.total_sample_count
    }
}
