//! Error taxonomy for the monitor
//!
//! Per-sample sensor problems live in [`crate::sensors::SensorError`] and
//! transport failures in [`crate::report::TransportError`]. The types here
//! cover the cycle level.

use thiserror_no_std::Error;

/// Fatal monitor errors. The firmware restarts the device on any of these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    #[error("WiFi reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Outcome of an aggregation window that produced nothing reportable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    #[error("no valid samples in a window of {total}")]
    NoValidSamples { total: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
