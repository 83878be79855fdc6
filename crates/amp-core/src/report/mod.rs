//! Reading reporter
//!
//! Serializes one [`AggregatedReading`] with its timestamp, submits it with a
//! single POST and classifies what came back. One attempt per cycle: there is
//! no retry, backoff or queue, the outcome is only logged.

pub mod http;

pub use http::{HttpResponse, Transport, TransportError};

use alloc::format;
use alloc::string::String;

use log::{error, info, warn};
use serde::Serialize;

use crate::config::{ApiKeyHeader, IngestConfig};
use crate::link::Connectivity;
use crate::reading::AggregatedReading;
use crate::time::ResolvedTimestamp;

/// Response bodies are logged up to this many bytes.
const LOGGED_BODY_LIMIT: usize = 256;

/// Classified result of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success,
    RateLimited,
    Unauthorized,
    ClientOrValidationError,
    ServerError,
    TransportError,
}

impl SubmissionOutcome {
    /// Map an HTTP status code. Only an exact 200 is a success.
    pub const fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Success,
            429 => Self::RateLimited,
            401 => Self::Unauthorized,
            400..=499 => Self::ClientOrValidationError,
            _ => Self::ServerError,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RateLimited => "rate limited",
            Self::Unauthorized => "unauthorized",
            Self::ClientOrValidationError => "rejected payload",
            Self::ServerError => "server error",
            Self::TransportError => "transport error",
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = libm::pow(10.0, f64::from(decimals));
    libm::round(value * scale) / scale
}

#[derive(Serialize, Debug)]
struct Payload<'a> {
    device_id: &'a str,
    timestamp: &'a str,
    readings: Readings,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata<'a>>,
}

#[derive(Serialize, Debug)]
struct Readings {
    current_rms: f64,
    voltage: f64,
    power_watts: f64,
    sample_count: u32,
}

#[derive(Serialize, Debug)]
struct Metadata<'a> {
    firmware_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rssi: Option<i32>,
    uptime_seconds: u64,
}

pub struct ReadingReporter<'a> {
    ingest: IngestConfig<'a>,
}

impl<'a> ReadingReporter<'a> {
    pub const fn new(ingest: IngestConfig<'a>) -> Self {
        Self { ingest }
    }

    /// JSON body for one reading. `rssi` and `uptime_seconds` only appear
    /// when metadata is enabled.
    pub fn encode(
        &self,
        reading: &AggregatedReading,
        timestamp: &ResolvedTimestamp,
        rssi: Option<i32>,
        uptime_seconds: u64,
    ) -> Result<String, serde_json::Error> {
        let payload = Payload {
            device_id: self.ingest.device_id,
            timestamp: timestamp.as_str(),
            readings: Readings {
                current_rms: round_to(reading.average_current_amps(), 3),
                voltage: reading.nominal_voltage(),
                power_watts: round_to(reading.average_power_watts(), 2),
                sample_count: reading.valid_sample_count(),
            },
            metadata: self.ingest.include_metadata.then_some(Metadata {
                firmware_version: self.ingest.firmware_version,
                rssi,
                uptime_seconds,
            }),
        };
        serde_json::to_string(&payload)
    }

    /// Submit one reading. Fast-fails with `TransportError` when the link is
    /// down, without touching the transport.
    pub async fn submit<L, T>(
        &self,
        link: &L,
        transport: &mut T,
        reading: &AggregatedReading,
        timestamp: &ResolvedTimestamp,
        uptime_seconds: u64,
    ) -> SubmissionOutcome
    where
        L: Connectivity,
        T: Transport,
    {
        info!("Submitting reading to {}", self.ingest.url);

        if !link.is_connected() {
            error!("Link is down, skipping submission");
            return SubmissionOutcome::TransportError;
        }

        let body = match self.encode(reading, timestamp, link.rssi(), uptime_seconds) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode payload: {}", e);
                return SubmissionOutcome::TransportError;
            }
        };
        info!("Payload: {}", body);

        let bearer;
        let key_header = match self.ingest.api_key_header {
            ApiKeyHeader::XApiKey => ("x-api-key", self.ingest.api_key),
            ApiKeyHeader::Bearer => {
                bearer = format!("Bearer {}", self.ingest.api_key);
                ("Authorization", bearer.as_str())
            }
        };
        let headers = [
            ("Content-Type", "application/json"),
            key_header,
            ("X-Device-Type", self.ingest.device_type),
        ];

        let outcome = match transport
            .post(self.ingest.url, &headers, body.as_bytes())
            .await
        {
            Ok(response) => {
                info!("HTTP status: {}", response.status);
                info!("Response: {}", truncate(&response.body, LOGGED_BODY_LIMIT));
                SubmissionOutcome::from_status(response.status)
            }
            Err(e) => {
                error!("HTTP request failed: {}", e);
                SubmissionOutcome::TransportError
            }
        };

        match outcome {
            SubmissionOutcome::Success => info!("Reading accepted"),
            SubmissionOutcome::RateLimited => warn!("Rate limit reached, next cycle will try again"),
            SubmissionOutcome::Unauthorized => error!("API key rejected"),
            SubmissionOutcome::ClientOrValidationError => error!("Payload or validation rejected"),
            SubmissionOutcome::ServerError => error!("Ingestion endpoint failed"),
            SubmissionOutcome::TransportError => {}
        }

        outcome
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::time::{TimeOrigin, TimestampResolver};
    use crate::testing::{FakeLink, RecordingTransport};
    use embassy_futures::block_on;

    fn ingest() -> IngestConfig<'static> {
        let mut ingest = Config::DEFAULT.ingest;
        ingest.url = "http://ingest.local/functions/v1/iot-ingest";
        ingest.api_key = "iot_secret";
        ingest.device_id = "4b6d07de-007e-4bf5-a1f6-a3fdd08abf0e";
        ingest
    }

    fn timestamp() -> ResolvedTimestamp {
        TimestampResolver::from_config(&Config::DEFAULT.clock)
            .render(1_710_506_096, TimeOrigin::Synchronized)
    }

    fn reading(amps: f64) -> AggregatedReading {
        AggregatedReading::new(amps, 127.0, 290, 300)
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SubmissionOutcome::from_status(200), SubmissionOutcome::Success);
        assert_eq!(SubmissionOutcome::from_status(429), SubmissionOutcome::RateLimited);
        assert_eq!(SubmissionOutcome::from_status(401), SubmissionOutcome::Unauthorized);
        for status in [400, 403, 404, 422, 499] {
            assert_eq!(
                SubmissionOutcome::from_status(status),
                SubmissionOutcome::ClientOrValidationError
            );
        }
        for status in [500, 502, 503, 599, 600] {
            assert_eq!(SubmissionOutcome::from_status(status), SubmissionOutcome::ServerError);
        }
        // Only exact 200 is success.
        for status in [201, 204, 302] {
            assert_eq!(SubmissionOutcome::from_status(status), SubmissionOutcome::ServerError);
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(156.789, 2), 156.79);
        assert_eq!(round_to(2.0, 3), 2.0);
    }

    #[test]
    fn test_payload_shape() {
        let reporter = ReadingReporter::new(ingest());
        let body = reporter.encode(&reading(1.23456), &timestamp(), Some(-61), 0).unwrap();
        assert_eq!(
            body,
            r#"{"device_id":"4b6d07de-007e-4bf5-a1f6-a3fdd08abf0e","timestamp":"2024-03-15T09:34:56-03:00","readings":{"current_rms":1.235,"voltage":127.0,"power_watts":156.79,"sample_count":290}}"#
        );
    }

    #[test]
    fn test_payload_metadata_is_opt_in() {
        let mut config = ingest();
        config.include_metadata = true;
        config.firmware_version = "0.1.0";
        let reporter = ReadingReporter::new(config);

        let body = reporter.encode(&reading(2.0), &timestamp(), None, 3600).unwrap();
        assert!(body.ends_with(r#""metadata":{"firmware_version":"0.1.0","uptime_seconds":3600}}"#));

        let body = reporter.encode(&reading(2.0), &timestamp(), Some(-67), 3600).unwrap();
        assert!(body.ends_with(
            r#""metadata":{"firmware_version":"0.1.0","rssi":-67,"uptime_seconds":3600}}"#
        ));
    }

    #[test]
    fn test_submit_reports_link_rssi() {
        let mut config = ingest();
        config.include_metadata = true;
        config.firmware_version = "0.1.0";
        let link = FakeLink::connected().with_rssi(-72);
        let mut transport = RecordingTransport::responding(200, "");

        block_on(ReadingReporter::new(config).submit(&link, &mut transport, &reading(2.0), &timestamp(), 42));

        assert!(transport.requests()[0]
            .body
            .contains(r#""metadata":{"firmware_version":"0.1.0","rssi":-72,"uptime_seconds":42}"#));
    }

    #[test]
    fn test_submit_posts_once_with_headers() {
        let reporter = ReadingReporter::new(ingest());
        let link = FakeLink::connected();
        let mut transport = RecordingTransport::responding(200, r#"{"success":true}"#);

        let outcome = block_on(reporter.submit(&link, &mut transport, &reading(2.0), &timestamp(), 0));

        assert_eq!(outcome, SubmissionOutcome::Success);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "http://ingest.local/functions/v1/iot-ingest");
        assert!(request.has_header("Content-Type", "application/json"));
        assert!(request.has_header("x-api-key", "iot_secret"));
        assert!(request.has_header("X-Device-Type", "energy"));
        assert!(request.body.contains(r#""power_watts":254.0"#));
    }

    #[test]
    fn test_submit_bearer_header() {
        let mut config = ingest();
        config.api_key_header = ApiKeyHeader::Bearer;
        let mut transport = RecordingTransport::responding(200, "");
        block_on(ReadingReporter::new(config).submit(
            &FakeLink::connected(),
            &mut transport,
            &reading(2.0),
            &timestamp(),
            0,
        ));
        assert!(transport.requests()[0].has_header("Authorization", "Bearer iot_secret"));
    }

    #[test]
    fn test_submit_classifies_rejections() {
        let reporter = ReadingReporter::new(ingest());
        for (status, expected) in [
            (429, SubmissionOutcome::RateLimited),
            (401, SubmissionOutcome::Unauthorized),
            (400, SubmissionOutcome::ClientOrValidationError),
            (500, SubmissionOutcome::ServerError),
        ] {
            let mut transport = RecordingTransport::responding(status, r#"{"error":"nope"}"#);
            let outcome = block_on(reporter.submit(
                &FakeLink::connected(),
                &mut transport,
                &reading(2.0),
                &timestamp(),
                0,
            ));
            assert_eq!(outcome, expected);
        }
    }

    #[test]
    fn test_submit_transport_failure() {
        let mut transport = RecordingTransport::failing(TransportError::Tls);
        let outcome = block_on(ReadingReporter::new(ingest()).submit(
            &FakeLink::connected(),
            &mut transport,
            &reading(2.0),
            &timestamp(),
            0,
        ));
        assert_eq!(outcome, SubmissionOutcome::TransportError);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_submit_fast_fails_when_disconnected() {
        let mut transport = RecordingTransport::responding(200, "");
        let outcome = block_on(ReadingReporter::new(ingest()).submit(
            &FakeLink::disconnected(),
            &mut transport,
            &reading(2.0),
            &timestamp(),
            0,
        ));
        assert_eq!(outcome, SubmissionOutcome::TransportError);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("añb", 2), "a");
    }
}
