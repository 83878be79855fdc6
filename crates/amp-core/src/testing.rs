//! Hand-written fakes for the collaborator traits, used by unit tests.

use alloc::string::{String, ToString};
use core::cell::Cell;
use alloc::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::link::Connectivity;
use crate::report::{HttpResponse, Transport, TransportError};
use crate::sampling::RmsSource;
use crate::sensors::{AdcSource, SensorError};
use crate::time::TimeSource;

/// Replays raw values in a loop. An empty script fails every read.
pub struct ScriptedAdc {
    values: Vec<u16>,
    next: usize,
}

impl ScriptedAdc {
    pub fn new(values: &[u16]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl AdcSource for ScriptedAdc {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        if self.values.is_empty() {
            return Err(SensorError::ReadFailed {
                sensor: "ADC",
                details: "no scripted values",
            });
        }
        let raw = self.values[self.next % self.values.len()];
        self.next += 1;
        Ok(raw)
    }
}

/// Returns immediately and records how long it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    calls: u32,
    elapsed_us: u64,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.elapsed_us += u64::from(ns) / 1_000;
    }

    async fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.elapsed_us += u64::from(us);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.elapsed_us += u64::from(ms) * 1_000;
    }
}

/// Clock whose sync result and uptime are set by the test.
pub struct FakeClock {
    epoch: u64,
    uptime_millis: u64,
    synced: bool,
    sync_at: Option<(u32, u64)>,
    sync_calls: u32,
}

impl FakeClock {
    /// Every sync succeeds and the epoch stays at `epoch`.
    pub fn synced(epoch: u64) -> Self {
        Self {
            epoch,
            uptime_millis: 0,
            synced: true,
            sync_at: None,
            sync_calls: 0,
        }
    }

    /// Every sync fails and the clock keeps reporting `epoch`.
    pub fn unsynced(epoch: u64) -> Self {
        Self {
            synced: false,
            ..Self::synced(epoch)
        }
    }

    /// Make the `call`-th sync (1-based) and every later one succeed with `epoch`.
    pub fn sync_after(&mut self, call: u32, epoch: u64) {
        self.sync_at = Some((call, epoch));
    }

    pub fn set_uptime_millis(&mut self, millis: u64) {
        self.uptime_millis = millis;
    }

    pub fn sync_calls(&self) -> u32 {
        self.sync_calls
    }
}

impl TimeSource for FakeClock {
    async fn sync(&mut self) -> bool {
        self.sync_calls += 1;
        if let Some((call, epoch)) = self.sync_at {
            if self.sync_calls >= call {
                self.synced = true;
                self.epoch = epoch;
            }
        }
        self.synced
    }

    fn epoch_seconds(&self) -> u64 {
        self.epoch
    }

    fn uptime_millis(&self) -> u64 {
        self.uptime_millis
    }
}

/// Replays RMS results in a loop.
pub struct ScriptedRms {
    script: Vec<Result<f64, SensorError>>,
    calls: u32,
}

impl ScriptedRms {
    pub fn new(script: &[Result<f64, SensorError>]) -> Self {
        Self {
            script: script.to_vec(),
            calls: 0,
        }
    }

    pub fn values(values: &[f64]) -> Self {
        Self {
            script: values.iter().copied().map(Ok).collect(),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl RmsSource for ScriptedRms {
    async fn measure_rms<D: DelayNs>(&mut self, _delay: &mut D) -> Result<f64, SensorError> {
        let index = self.calls as usize;
        self.calls += 1;
        if self.script.is_empty() {
            return Err(SensorError::ReadFailed {
                sensor: "RMS",
                details: "no scripted values",
            });
        }
        self.script[index % self.script.len()]
    }
}

/// Link whose reconnect attempts follow a script. Unscripted attempts fail.
pub struct FakeLink {
    connected: bool,
    connects: Vec<bool>,
    connect_calls: u32,
    rssi: Option<i32>,
    drop_after: Option<u32>,
    checks: Cell<u32>,
}

impl FakeLink {
    pub fn connected() -> Self {
        Self {
            connected: true,
            connects: Vec::new(),
            connect_calls: 0,
            rssi: None,
            drop_after: None,
            checks: Cell::new(0),
        }
    }

    /// Up for the first `checks` calls to `is_connected`, down afterwards.
    pub fn drops_after(checks: u32) -> Self {
        Self {
            drop_after: Some(checks),
            ..Self::connected()
        }
    }

    pub fn with_rssi(mut self, rssi: i32) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    pub fn script_connects(&mut self, results: &[bool]) {
        self.connects = results.to_vec();
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }
}

impl Connectivity for FakeLink {
    fn is_connected(&self) -> bool {
        let checks = self.checks.get() + 1;
        self.checks.set(checks);
        match self.drop_after {
            Some(limit) if checks > limit => false,
            _ => self.connected,
        }
    }

    async fn connect(&mut self) -> bool {
        let result = self
            .connects
            .get(self.connect_calls as usize)
            .copied()
            .unwrap_or(false);
        self.connect_calls += 1;
        self.connected = result;
        result
    }

    fn rssi(&self) -> Option<i32> {
        if self.connected { self.rssi } else { None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn has_header(&self, name: &str, value: &str) -> bool {
        self.headers.iter().any(|(n, v)| n == name && v == value)
    }
}

/// Answers every POST with the same canned result and keeps the requests.
pub struct RecordingTransport {
    response: Result<HttpResponse, TransportError>,
    requests: Vec<RecordedRequest>,
}

impl RecordingTransport {
    pub fn responding(status: u16, body: &str) -> Self {
        Self {
            response: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            requests: Vec::new(),
        }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            response: Err(error),
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }
}

impl Transport for RecordingTransport {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        self.requests.push(RecordedRequest {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        self.response.clone()
    }
}
