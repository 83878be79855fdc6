//! Device configuration
//!
//! All tunables of the monitor live here. The firmware builds its [`Config`]
//! from [`Config::DEFAULT`] plus build-time secrets; the simulator can also
//! deserialize one from JSON.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::report::http::check_url;

/// 2020-01-01T00:00:00Z. Anything earlier is treated as an unsynchronized clock.
pub const MIN_PLAUSIBLE_EPOCH: u64 = 1_577_836_800;

/// Largest UTC offset accepted, in seconds (±18 h).
const MAX_UTC_OFFSET_SECS: i32 = 18 * 3600;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub ingest: IngestConfig<'a>,
    pub sensor: SensorConfig,
    pub sampling: SamplingConfig,
    pub clock: ClockConfig<'a>,
    pub link: LinkConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

/// Where and how readings are reported.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig<'a> {
    /// Ingestion endpoint, e.g. `https://<project>.supabase.co/functions/v1/iot-ingest`
    pub url: &'a str,
    pub api_key: &'a str,
    pub api_key_header: ApiKeyHeader,
    pub device_id: &'a str,
    /// Value of the `X-Device-Type` header
    pub device_type: &'a str,
    /// Attach the optional `metadata` object to every payload
    pub include_metadata: bool,
    pub firmware_version: &'a str,
}

/// How the API key travels in the request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyHeader {
    /// `x-api-key: <key>`
    #[default]
    XApiKey,
    /// `Authorization: Bearer <key>`
    Bearer,
}

/// Linear transfer function of the hall-effect current sensor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    /// Full-scale raw ADC value (12-bit: 4095)
    pub adc_max: u16,
    /// ADC reference voltage in volts
    pub reference_voltage: f64,
    /// Sensor output at 0 A, in volts
    pub zero_offset_voltage: f64,
    /// Sensor sensitivity in volts per ampere (ACS712-5A: 0.185)
    pub sensitivity: f64,
    /// Line voltage used to derive power from current
    pub nominal_voltage: f64,
}

impl SensorConfig {
    /// Convert a raw ADC reading into instantaneous current (A).
    ///
    /// Raw values above `adc_max` are clamped to full scale.
    pub fn current_from_raw(&self, raw: u16) -> f64 {
        let raw = raw.min(self.adc_max);
        let volts = f64::from(raw) / f64::from(self.adc_max) * self.reference_voltage;
        (volts - self.zero_offset_voltage) / self.sensitivity
    }
}

/// Micro-window (RMS burst) and macro-window (aggregation) timing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    /// Instantaneous samples per RMS value
    pub rms_samples: u32,
    /// Spacing between instantaneous samples, in microseconds
    pub rms_spacing_us: u32,
    /// RMS values per aggregated reading
    pub window_samples: u32,
    /// Pause between RMS values, in milliseconds
    pub window_interval_ms: u32,
    /// Lower plausibility bound (inclusive), amperes
    pub plausible_min_amps: f64,
    /// Upper plausibility bound (exclusive), amperes
    pub plausible_max_amps: f64,
    /// Log progress every N RMS values (0 disables)
    pub progress_every: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig<'a> {
    pub ntp_server: &'a str,
    /// Fixed offset applied when rendering timestamps, seconds east of UTC
    pub utc_offset_secs: i32,
    /// Base epoch for the uptime fallback
    pub fallback_base_epoch: u64,
    /// Epochs below this are considered unsynchronized
    pub min_plausible_epoch: u64,
    pub initial_sync_attempts: u32,
    pub initial_sync_spacing_ms: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u32,
    /// Grace period before the device restarts after reconnect exhaustion
    pub restart_delay_ms: u32,
}

impl Config<'static> {
    pub const DEFAULT: Self = Self {
        internet: InternetConfig {
            ssid: "",
            password: "",
        },
        ingest: IngestConfig {
            url: "",
            api_key: "",
            api_key_header: ApiKeyHeader::XApiKey,
            device_id: "",
            device_type: "energy",
            include_metadata: false,
            firmware_version: "",
        },
        sensor: SensorConfig {
            adc_max: 4095,
            reference_voltage: 3.3,
            zero_offset_voltage: 2.5,
            sensitivity: 0.185,
            nominal_voltage: 127.0,
        },
        sampling: SamplingConfig {
            rms_samples: 100,
            rms_spacing_us: 500,
            window_samples: 300,
            window_interval_ms: 1000,
            plausible_min_amps: 0.0,
            plausible_max_amps: 30.0,
            progress_every: 30,
        },
        clock: ClockConfig {
            ntp_server: "pool.ntp.org",
            utc_offset_secs: -3 * 3600,
            fallback_base_epoch: 1_698_700_000,
            min_plausible_epoch: MIN_PLAUSIBLE_EPOCH,
            initial_sync_attempts: 10,
            initial_sync_spacing_ms: 1000,
        },
        link: LinkConfig {
            max_attempts: 30,
            retry_delay_ms: 500,
            restart_delay_ms: 10_000,
        },
    };
}

impl Default for Config<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Config<'_> {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensor = &self.sensor;
        if sensor.adc_max == 0 {
            return Err(ConfigError::Invalid {
                field: "sensor.adc_max",
                reason: "must be non-zero",
            });
        }
        if sensor.sensitivity == 0.0 || !sensor.sensitivity.is_finite() {
            return Err(ConfigError::Invalid {
                field: "sensor.sensitivity",
                reason: "must be finite and non-zero",
            });
        }
        if !sensor.nominal_voltage.is_finite() || sensor.nominal_voltage <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "sensor.nominal_voltage",
                reason: "must be positive",
            });
        }

        let sampling = &self.sampling;
        if sampling.rms_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "sampling.rms_samples",
                reason: "must be non-zero",
            });
        }
        if sampling.window_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "sampling.window_samples",
                reason: "must be non-zero",
            });
        }
        // A NaN bound compares as unordered and is rejected here too.
        if sampling
            .plausible_min_amps
            .partial_cmp(&sampling.plausible_max_amps)
            != Some(Ordering::Less)
        {
            return Err(ConfigError::Invalid {
                field: "sampling.plausible_max_amps",
                reason: "plausibility range is empty",
            });
        }

        if self.clock.utc_offset_secs.abs() > MAX_UTC_OFFSET_SECS {
            return Err(ConfigError::Invalid {
                field: "clock.utc_offset_secs",
                reason: "offset exceeds 18 hours",
            });
        }

        if self.ingest.device_id.is_empty() {
            return Err(ConfigError::Missing("ingest.device_id"));
        }
        if self.ingest.api_key.is_empty() {
            return Err(ConfigError::Missing("ingest.api_key"));
        }
        if self.ingest.url.is_empty() {
            return Err(ConfigError::Missing("ingest.url"));
        }
        if check_url(self.ingest.url).is_err() {
            return Err(ConfigError::Invalid {
                field: "ingest.url",
                reason: "must be an http:// or https:// URL",
            });
        }

        Ok(())
    }
}
