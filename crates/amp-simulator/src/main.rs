//! Desktop simulator for the amp-rs current monitor.
//!
//! Runs the same [`EnergyMonitor`] as the firmware with host-side
//! collaborators: a synthetic 60 Hz load on the ADC, the host wall clock, an
//! always-up link and a dry-run transport that logs the request and answers
//! `200`. Waiting is compressed so a five-minute window passes in about a
//! second.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info amp-simulator [config.json]
//! ```
//!
//! | Variable             | Effect                                          |
//! |----------------------|-------------------------------------------------|
//! | `AMP_SIM_CYCLES`     | Number of macro-cycles to run (default 3)       |
//! | `AMP_SIM_SPEEDUP`    | Time compression factor (default 300)           |
//! | `AMP_SIM_UNSYNCED`   | Any value: the clock never syncs                |
//! | `AMP_SIM_STATUS`     | HTTP status the dry-run transport answers with  |

use std::cell::Cell;
use std::f64::consts::PI;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use amp_core::link::Connectivity;
use amp_core::report::{HttpResponse, Transport, TransportError};
use amp_core::sampling::{RmsEstimator, RmsSampler};
use amp_core::sensors::{AdcSource, CurrentSensor, SensorError};
use amp_core::{Config, CycleReport, EnergyMonitor, TimeSource};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_CYCLES: u32 = 3;
const DEFAULT_SPEEDUP: u64 = 300;
const LINE_FREQUENCY_HZ: f64 = 60.0;

/// Microseconds of simulated time since start, shared by the delay, the ADC
/// and the clock.
type VirtualTime = Rc<Cell<u64>>;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Sleeps a compressed share of every request and advances virtual time by
/// the full amount.
struct SimDelay {
    now_us: VirtualTime,
    speedup: u64,
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let us = u64::from(ns) / 1_000;
        self.now_us.set(self.now_us.get() + us);
        let real = Duration::from_micros(us / self.speedup);
        if !real.is_zero() {
            std::thread::sleep(real);
        }
    }
}

/// Hall-effect sensor on a load that drifts between 0.5 and 2.5 A RMS. The
/// input drops out for two seconds every two minutes, which the window
/// counts as invalid samples.
struct SyntheticAdc {
    now_us: VirtualTime,
    zero_offset_voltage: f64,
    reference_voltage: f64,
    sensitivity: f64,
    adc_max: u16,
}

impl SyntheticAdc {
    fn new(now_us: VirtualTime, config: &Config<'_>) -> Self {
        Self {
            now_us,
            zero_offset_voltage: config.sensor.zero_offset_voltage,
            reference_voltage: config.sensor.reference_voltage,
            sensitivity: config.sensor.sensitivity,
            adc_max: config.sensor.adc_max,
        }
    }

    fn load_rms_amps(t: f64) -> f64 {
        1.5 + (t / 90.0).sin()
    }
}

impl AdcSource for SyntheticAdc {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        let t = self.now_us.get() as f64 / 1e6;
        if t % 120.0 >= 118.0 {
            return Err(SensorError::ReadFailed {
                sensor: "ADC",
                details: "simulated dropout",
            });
        }
        let peak = Self::load_rms_amps(t) * 2f64.sqrt();
        let amps = peak * (2.0 * PI * LINE_FREQUENCY_HZ * t).sin();
        let volts = self.zero_offset_voltage + amps * self.sensitivity;
        let raw = volts / self.reference_voltage * f64::from(self.adc_max);
        Ok(raw.round().clamp(0.0, f64::from(self.adc_max)) as u16)
    }
}

/// Host wall clock; uptime follows virtual time.
struct HostClock {
    now_us: VirtualTime,
    reachable: bool,
    synced_epoch: Option<u64>,
}

impl TimeSource for HostClock {
    async fn sync(&mut self) -> bool {
        if !self.reachable {
            return false;
        }
        self.synced_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());
        self.synced_epoch.is_some()
    }

    fn epoch_seconds(&self) -> u64 {
        self.synced_epoch.unwrap_or(0)
    }

    fn uptime_millis(&self) -> u64 {
        self.now_us.get() / 1_000
    }
}

struct SimLink {
    connected: bool,
}

impl Connectivity for SimLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> bool {
        self.connected = true;
        true
    }

    fn rssi(&self) -> Option<i32> {
        self.connected.then_some(-58)
    }
}

/// Logs what would be sent and answers with a fixed status.
struct DryRunTransport {
    status: u16,
}

impl Transport for DryRunTransport {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        info!("POST {}", url);
        for (name, value) in headers {
            info!("  {}: {}", name, value);
        }
        info!("  {}", String::from_utf8_lossy(body));

        let body = if self.status == 200 {
            r#"{"success":true}"#
        } else {
            r#"{"error":"simulated failure"}"#
        };
        Ok(HttpResponse {
            status: self.status,
            body: body.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={}", key, value);
            default
        }),
        Err(_) => default,
    }
}

/// Defaults with a simulator identity, or the JSON file given on the command line.
fn load_config() -> Result<Config<'static>, String> {
    let Some(path) = std::env::args().nth(1) else {
        let mut config = Config::DEFAULT;
        config.ingest.url = "http://localhost:8080/functions/v1/iot-ingest";
        config.ingest.api_key = "dry-run";
        config.ingest.device_id = "amp-simulator";
        config.ingest.firmware_version = env!("CARGO_PKG_VERSION");
        return Ok(config);
    };

    let text = std::fs::read_to_string(&path).map_err(|e| format!("{}: {}", path, e))?;
    // The config borrows its strings for the rest of the process.
    let text: &'static str = Box::leak(text.into_boxed_str());
    serde_json::from_str(text).map_err(|e| format!("{}: {}", path, e))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    info!("Starting amp-rs simulator");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let cycles = env_or("AMP_SIM_CYCLES", DEFAULT_CYCLES);
    let speedup = env_or("AMP_SIM_SPEEDUP", DEFAULT_SPEEDUP).max(1);
    info!(
        "Running {} cycle(s) of {} samples at {}x speed",
        cycles, config.sampling.window_samples, speedup
    );

    let now_us: VirtualTime = Rc::new(Cell::new(0));
    let sensor = CurrentSensor::new(SyntheticAdc::new(now_us.clone(), &config), config.sensor);
    let source = RmsSampler::new(sensor, RmsEstimator::from_config(&config.sampling));
    let delay = SimDelay {
        now_us: now_us.clone(),
        speedup,
    };
    let clock = HostClock {
        now_us,
        reachable: std::env::var_os("AMP_SIM_UNSYNCED").is_none(),
        synced_epoch: None,
    };
    let link = SimLink { connected: false };
    let transport = DryRunTransport {
        status: env_or("AMP_SIM_STATUS", 200),
    };

    let mut monitor = EnergyMonitor::new(&config, source, delay, clock, link, transport);

    if let Err(e) = block_on(monitor.boot()) {
        error!("Boot failed: {}", e);
        return ExitCode::FAILURE;
    }

    for _ in 0..cycles {
        match block_on(monitor.run_cycle()) {
            Ok(CycleReport::Submitted {
                reading,
                timestamp,
                outcome,
            }) => info!(
                "{} {:.3} A {:.2} W ({}/{}) -> {}",
                timestamp,
                reading.average_current_amps(),
                reading.average_power_watts(),
                reading.valid_sample_count(),
                reading.total_sample_count(),
                outcome.label()
            ),
            Ok(CycleReport::NoValidSamples { total }) => {
                warn!("Window of {} samples had nothing valid", total)
            }
            Err(e) => {
                error!("Fatal: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    info!("Simulator exiting");
    ExitCode::SUCCESS
}
