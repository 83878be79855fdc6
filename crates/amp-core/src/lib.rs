//! Hardware-independent core library for amp-rs
//!
//! This crate contains all platform-agnostic logic for the amp current
//! monitor: the sample reader and RMS estimator, the 5-minute aggregation
//! window, timestamp resolution with an uptime fallback, report
//! serialization and outcome classification, and the cycle driver that ties
//! them together.
//!
//! Every piece of hardware or network is reached through a collaborator trait
//! ([`sensors::AdcSource`], [`time::TimeSource`], [`link::Connectivity`],
//! [`report::Transport`]) injected into [`monitor::EnergyMonitor`] at
//! construction, so the whole pipeline runs on desktop hosts for the
//! simulator and tests.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod link;
pub mod monitor;
pub mod reading;
pub mod report;
pub mod sampling;
pub mod sensors;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{ConfigError, MonitorError, WindowError};
pub use monitor::{CycleReport, EnergyMonitor, RunState};
pub use reading::AggregatedReading;
pub use report::{SubmissionOutcome, Transport, TransportError};
pub use time::{ResolvedTimestamp, TimeOrigin, TimeSource};
