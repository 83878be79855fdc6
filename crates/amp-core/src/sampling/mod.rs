//! Dual-timescale sampling
//!
//! - **Micro-window** ([`rms`]): a burst of instantaneous readings (100 at
//!   500 µs spacing, ~50 ms) reduced to one RMS current.
//! - **Macro-window** ([`window`]): RMS values taken once per second for five
//!   minutes, filtered by a plausibility range and averaged into one
//!   [`AggregatedReading`](crate::reading::AggregatedReading).
//!
//! Both reductions keep running sums only; no sample sequence is retained.

pub mod rms;
pub mod window;

pub use rms::{RmsEstimator, RmsSampler, RmsSource, SquareAccumulator};
pub use window::{AggregationWindow, PlausibilityRange, WindowAccumulator};
