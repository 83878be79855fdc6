//! Timestamp resolution
//!
//! Network time is preferred, but an unsynchronized clock reports epochs in
//! 1970. Anything before [`MIN_PLAUSIBLE_EPOCH`](crate::config::MIN_PLAUSIBLE_EPOCH)
//! is replaced by `fallback_base_epoch + uptime`, which is monotonic but not
//! wall-clock accurate.
//!
//! The time source always reports UTC. The configured offset is applied once,
//! when rendering, and the same offset produces the `±HH:MM` suffix.

pub mod sntp;

use core::fmt::Write;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::config::ClockConfig;

/// `YYYY-MM-DDTHH:MM:SS±HH:MM` is 25 bytes.
pub const TIMESTAMP_CAPACITY: usize = 32;

/// Network-synchronized wall clock plus monotonic uptime.
pub trait TimeSource {
    /// Ask for a fresh network time. Returns whether the sync succeeded.
    fn sync(&mut self) -> impl Future<Output = bool>;

    /// Seconds since the Unix epoch, UTC. Implausibly small when never synced.
    fn epoch_seconds(&self) -> u64;

    /// Milliseconds since boot.
    fn uptime_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrigin {
    /// Epoch came from the network clock and passed the plausibility check
    Synchronized,
    /// Epoch was derived from the fallback base plus uptime
    Fallback,
}

/// A rendered, timezone-qualified timestamp. Never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    epoch: u64,
    origin: TimeOrigin,
    text: heapless::String<TIMESTAMP_CAPACITY>,
}

impl ResolvedTimestamp {
    /// UTC epoch seconds the text was rendered from
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub const fn origin(&self) -> TimeOrigin {
        self.origin
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }
}

impl core::fmt::Display for ResolvedTimestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampResolver {
    utc_offset_secs: i32,
    fallback_base_epoch: u64,
    min_plausible_epoch: u64,
}

impl TimestampResolver {
    pub const fn new(utc_offset_secs: i32, fallback_base_epoch: u64, min_plausible_epoch: u64) -> Self {
        Self {
            utc_offset_secs,
            fallback_base_epoch,
            min_plausible_epoch,
        }
    }

    pub const fn from_config(clock: &ClockConfig<'_>) -> Self {
        Self::new(
            clock.utc_offset_secs,
            clock.fallback_base_epoch,
            clock.min_plausible_epoch,
        )
    }

    /// Request a sync, then render whichever epoch is trustworthy.
    pub async fn resolve<T: TimeSource>(&self, clock: &mut T) -> ResolvedTimestamp {
        if !clock.sync().await {
            info!("Time sync request failed, using last known clock");
        }
        let (epoch, origin) = self.pick_epoch(clock.epoch_seconds(), clock.uptime_millis());
        if origin == TimeOrigin::Fallback {
            warn!("Network time looks unsynchronized, using uptime fallback");
        }
        self.render(epoch, origin)
    }

    /// Choose between the synchronized epoch and the uptime fallback.
    pub fn pick_epoch(&self, synced_epoch: u64, uptime_millis: u64) -> (u64, TimeOrigin) {
        if synced_epoch >= self.min_plausible_epoch {
            (synced_epoch, TimeOrigin::Synchronized)
        } else {
            (
                self.fallback_base_epoch.saturating_add(uptime_millis / 1000),
                TimeOrigin::Fallback,
            )
        }
    }

    /// Render a UTC epoch in the configured fixed offset.
    pub fn render(&self, epoch: u64, origin: TimeOrigin) -> ResolvedTimestamp {
        let offset = FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix());
        let utc = i64::try_from(epoch)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_default();
        let local = utc.with_timezone(&offset);

        let offset_secs = offset.local_minus_utc();
        let sign = if offset_secs < 0 { '-' } else { '+' };
        let offset_mins = offset_secs.unsigned_abs() / 60;

        let mut text = heapless::String::new();
        // Capacity covers every four-digit year.
        let _ = write!(
            text,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}:{:02}",
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            local.second(),
            sign,
            offset_mins / 60,
            offset_mins % 60,
        );

        ResolvedTimestamp {
            epoch,
            origin,
            text,
        }
    }

    /// Boot-time sync: retry until the clock syncs or attempts run out.
    ///
    /// Never fatal; returns whether the clock ended up synchronized.
    pub async fn initial_sync<T, D>(
        clock: &mut T,
        delay: &mut D,
        attempts: u32,
        spacing_ms: u32,
    ) -> bool
    where
        T: TimeSource,
        D: DelayNs,
    {
        info!("Synchronizing clock...");
        for attempt in 1..=attempts {
            if clock.sync().await {
                info!("Clock synchronized after {} attempt(s)", attempt);
                return true;
            }
            delay.delay_ms(spacing_ms).await;
        }
        warn!("Clock sync failed, timestamps will use the uptime fallback until it recovers");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MIN_PLAUSIBLE_EPOCH};
    use crate::testing::{FakeClock, RecordingDelay};
    use embassy_futures::block_on;

    fn resolver() -> TimestampResolver {
        TimestampResolver::from_config(&Config::DEFAULT.clock)
    }

    #[test]
    fn test_renders_synced_epoch_in_offset() {
        // 2024-03-15T12:34:56Z
        let ts = resolver().render(1_710_506_096, TimeOrigin::Synchronized);
        assert_eq!(ts.as_str(), "2024-03-15T09:34:56-03:00");
        assert_eq!(ts.epoch(), 1_710_506_096);
    }

    #[test]
    fn test_offset_crosses_midnight() {
        // 2020-01-01T01:00:00Z is still New Year's Eve at -03:00.
        let ts = resolver().render(MIN_PLAUSIBLE_EPOCH + 3600, TimeOrigin::Synchronized);
        assert_eq!(ts.as_str(), "2019-12-31T22:00:00-03:00");
    }

    #[test]
    fn test_positive_and_fractional_offsets() {
        let india = TimestampResolver::new(5 * 3600 + 30 * 60, 0, MIN_PLAUSIBLE_EPOCH);
        assert_eq!(
            india.render(MIN_PLAUSIBLE_EPOCH, TimeOrigin::Synchronized).as_str(),
            "2020-01-01T05:30:00+05:30"
        );

        let utc = TimestampResolver::new(0, 0, MIN_PLAUSIBLE_EPOCH);
        assert_eq!(
            utc.render(MIN_PLAUSIBLE_EPOCH, TimeOrigin::Synchronized).as_str(),
            "2020-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_plausibility_boundary() {
        let r = resolver();
        assert_eq!(
            r.pick_epoch(MIN_PLAUSIBLE_EPOCH, 5_000),
            (MIN_PLAUSIBLE_EPOCH, TimeOrigin::Synchronized)
        );
        assert_eq!(
            r.pick_epoch(MIN_PLAUSIBLE_EPOCH - 1, 5_000),
            (1_698_700_005, TimeOrigin::Fallback)
        );
    }

    #[test]
    fn test_resolve_uses_synced_clock() {
        let mut clock = FakeClock::synced(1_710_506_096);
        let ts = block_on(resolver().resolve(&mut clock));
        assert_eq!(ts.origin(), TimeOrigin::Synchronized);
        assert_eq!(ts.as_str(), "2024-03-15T09:34:56-03:00");
        assert_eq!(clock.sync_calls(), 1);
    }

    #[test]
    fn test_fallback_increases_with_uptime() {
        let mut clock = FakeClock::unsynced(42);
        clock.set_uptime_millis(10_000);
        let first = block_on(resolver().resolve(&mut clock));
        clock.set_uptime_millis(11_000);
        let second = block_on(resolver().resolve(&mut clock));

        assert_eq!(first.origin(), TimeOrigin::Fallback);
        assert_eq!(first.epoch(), 1_698_700_010);
        assert!(second.epoch() > first.epoch());
        assert!(second.as_str() > first.as_str());
        assert!(!first.as_str().is_empty());
    }

    #[test]
    fn test_initial_sync_retries_then_succeeds() {
        let mut clock = FakeClock::unsynced(0);
        clock.sync_after(3, 1_710_506_096);
        let mut delay = RecordingDelay::new();

        let synced = block_on(TimestampResolver::initial_sync(&mut clock, &mut delay, 10, 1000));

        assert!(synced);
        assert_eq!(clock.sync_calls(), 3);
        assert_eq!(delay.elapsed_us(), 2 * 1_000_000);
    }

    #[test]
    fn test_initial_sync_gives_up_without_error() {
        let mut clock = FakeClock::unsynced(0);
        let mut delay = RecordingDelay::new();
        let synced = block_on(TimestampResolver::initial_sync(&mut clock, &mut delay, 10, 1000));
        assert!(!synced);
        assert_eq!(clock.sync_calls(), 10);
    }
}
