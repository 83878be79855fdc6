//! Cycle driver
//!
//! [`EnergyMonitor`] owns every collaborator and runs one macro-cycle per
//! [`EnergyMonitor::run_cycle`] call: make sure the link is up, aggregate a
//! window, timestamp it and submit it. Nothing carries over between cycles.

use embedded_hal_async::delay::DelayNs;
use log::{error, info};

use crate::config::{ClockConfig, Config};
use crate::error::{MonitorError, WindowError};
use crate::link::{ConnectionSupervisor, Connectivity};
use crate::reading::AggregatedReading;
use crate::report::{ReadingReporter, SubmissionOutcome, Transport};
use crate::sampling::{AggregationWindow, RmsSource};
use crate::time::{ResolvedTimestamp, TimeSource, TimestampResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Connecting,
    Sampling,
    Reporting,
    Idle,
    Error,
}

/// What one macro-cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Every RMS value in the window was rejected; nothing was submitted.
    NoValidSamples { total: u32 },
    Submitted {
        reading: AggregatedReading,
        timestamp: ResolvedTimestamp,
        outcome: SubmissionOutcome,
    },
}

pub struct EnergyMonitor<'a, S, D, C, L, T> {
    state: RunState,
    cycles: u32,
    window: AggregationWindow,
    resolver: TimestampResolver,
    reporter: ReadingReporter<'a>,
    supervisor: ConnectionSupervisor,
    clock_config: ClockConfig<'a>,
    source: S,
    delay: D,
    clock: C,
    link: L,
    transport: T,
}

impl<'a, S, D, C, L, T> EnergyMonitor<'a, S, D, C, L, T>
where
    S: RmsSource,
    D: DelayNs,
    C: TimeSource,
    L: Connectivity,
    T: Transport,
{
    pub fn new(config: &Config<'a>, source: S, delay: D, clock: C, link: L, transport: T) -> Self {
        Self {
            state: RunState::Uninitialized,
            cycles: 0,
            window: AggregationWindow::from_config(&config.sampling, &config.sensor),
            resolver: TimestampResolver::from_config(&config.clock),
            reporter: ReadingReporter::new(config.ingest),
            supervisor: ConnectionSupervisor::from_config(&config.link),
            clock_config: config.clock,
            source,
            delay,
            clock,
            link,
            transport,
        }
    }

    /// Bring the link up and make the initial clock sync attempts.
    ///
    /// Only a failed link is fatal; an unsynchronized clock falls back to
    /// uptime-derived timestamps.
    pub async fn boot(&mut self) -> Result<bool, MonitorError> {
        info!("Booting energy monitor");
        self.state = RunState::Connecting;
        if let Err(e) = self
            .supervisor
            .ensure_connected(&mut self.link, &mut self.delay)
            .await
        {
            self.state = RunState::Error;
            return Err(e);
        }

        let synced = TimestampResolver::initial_sync(
            &mut self.clock,
            &mut self.delay,
            self.clock_config.initial_sync_attempts,
            self.clock_config.initial_sync_spacing_ms,
        )
        .await;
        self.state = RunState::Idle;
        Ok(synced)
    }

    /// Run one macro-cycle. Only a link that cannot be recovered is an error.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        self.cycles = self.cycles.wrapping_add(1);
        self.state = RunState::Connecting;
        if let Err(e) = self
            .supervisor
            .ensure_connected(&mut self.link, &mut self.delay)
            .await
        {
            self.state = RunState::Error;
            return Err(e);
        }

        self.state = RunState::Sampling;
        info!(
            "Cycle {}: aggregating {} RMS samples",
            self.cycles,
            self.window.window_size()
        );
        let reading = match self.window.aggregate(&mut self.source, &mut self.delay).await {
            Ok(reading) => reading,
            Err(WindowError::NoValidSamples { total }) => {
                error!("No valid samples in this window ({} taken), skipping submission", total);
                self.state = RunState::Idle;
                return Ok(CycleReport::NoValidSamples { total });
            }
        };

        info!(
            "Window complete: {:.3} A, {:.2} W, {}/{} valid samples",
            reading.average_current_amps(),
            reading.average_power_watts(),
            reading.valid_sample_count(),
            reading.total_sample_count()
        );

        self.state = RunState::Reporting;
        let timestamp = self.resolver.resolve(&mut self.clock).await;
        info!("Timestamp: {}", timestamp);

        let uptime_seconds = self.clock.uptime_millis() / 1000;
        let outcome = self
            .reporter
            .submit(&self.link, &mut self.transport, &reading, &timestamp, uptime_seconds)
            .await;
        info!("Cycle {} finished: {}", self.cycles, outcome.label());

        self.state = RunState::Idle;
        Ok(CycleReport::Submitted {
            reading,
            timestamp,
            outcome,
        })
    }

    /// Run cycles back to back. Returns only on a fatal error.
    pub async fn run_forever(&mut self) -> MonitorError {
        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Monitor stopped: {}", e);
                return e;
            }
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
