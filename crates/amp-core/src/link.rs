//! Network link supervision

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::config::LinkConfig;
use crate::error::MonitorError;

/// Network connectivity collaborator.
pub trait Connectivity {
    fn is_connected(&self) -> bool;

    /// Make one association attempt. Returns whether the link is up afterwards.
    fn connect(&mut self) -> impl Future<Output = bool>;

    /// Received signal strength of the current association, in dBm.
    fn rssi(&self) -> Option<i32>;
}

/// Bounded-retry reconnect run at the start of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSupervisor {
    max_attempts: u32,
    retry_delay_ms: u32,
}

impl ConnectionSupervisor {
    pub const fn new(max_attempts: u32, retry_delay_ms: u32) -> Self {
        Self {
            max_attempts,
            retry_delay_ms,
        }
    }

    pub const fn from_config(link: &LinkConfig) -> Self {
        Self::new(link.max_attempts, link.retry_delay_ms)
    }

    /// Return immediately when the link is up, otherwise reconnect with up to
    /// `max_attempts` attempts spaced by `retry_delay_ms`.
    pub async fn ensure_connected<L, D>(&self, link: &mut L, delay: &mut D) -> Result<(), MonitorError>
    where
        L: Connectivity,
        D: DelayNs,
    {
        if link.is_connected() {
            return Ok(());
        }

        warn!("WiFi disconnected, reconnecting...");
        for attempt in 1..=self.max_attempts {
            if link.connect().await && link.is_connected() {
                match link.rssi() {
                    Some(rssi) => info!("WiFi reconnected after {} attempt(s), RSSI {} dBm", attempt, rssi),
                    None => info!("WiFi reconnected after {} attempt(s)", attempt),
                }
                return Ok(());
            }
            if attempt < self.max_attempts {
                delay.delay_ms(self.retry_delay_ms).await;
            }
        }

        error!("WiFi reconnect failed after {} attempts", self.max_attempts);
        Err(MonitorError::ReconnectExhausted {
            attempts: self.max_attempts,
        })
    }
}
