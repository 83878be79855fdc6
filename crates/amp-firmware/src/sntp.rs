//! SNTP time source over an `embassy-net` UDP socket

use amp_core::time::TimeSource;
use amp_core::time::sntp::{NTP_PACKET_LEN, NTP_PORT, SntpError, parse_reply, request_packet};
use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, Instant, with_timeout};
use log::{info, warn};

const SNTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Wall clock anchored to the last successful SNTP exchange.
///
/// Between syncs the epoch advances with the monotonic embassy clock. Before
/// the first sync it reports 0, which the timestamp resolver treats as
/// unsynchronized.
pub struct SntpClock<'d> {
    stack: Stack<'d>,
    server: &'d str,
    anchor: Option<(u64, Instant)>,
}

impl<'d> SntpClock<'d> {
    pub fn new(stack: Stack<'d>, server: &'d str) -> Self {
        Self {
            stack,
            server,
            anchor: None,
        }
    }

    async fn query(&self) -> Result<u64, SntpError> {
        let addresses = self
            .stack
            .dns_query(self.server, DnsQueryType::A)
            .await
            .map_err(|_| SntpError::Dns)?;
        let address = *addresses.first().ok_or(SntpError::Dns)?;

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; 2 * NTP_PACKET_LEN];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; 2 * NTP_PACKET_LEN];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| SntpError::Socket)?;

        socket
            .send_to(&request_packet(), (address, NTP_PORT))
            .await
            .map_err(|_| SntpError::Socket)?;

        let mut reply = [0u8; NTP_PACKET_LEN];
        let (len, _) = with_timeout(SNTP_TIMEOUT, socket.recv_from(&mut reply))
            .await
            .map_err(|_| SntpError::Timeout)?
            .map_err(|_| SntpError::Socket)?;
        parse_reply(&reply[..len])
    }
}

impl TimeSource for SntpClock<'_> {
    async fn sync(&mut self) -> bool {
        if !self.stack.is_config_up() {
            return false;
        }
        match self.query().await {
            Ok(epoch) => {
                info!("SNTP sync from {}: {}", self.server, epoch);
                self.anchor = Some((epoch, Instant::now()));
                true
            }
            Err(e) => {
                warn!("SNTP sync from {} failed: {}", self.server, e);
                false
            }
        }
    }

    fn epoch_seconds(&self) -> u64 {
        match self.anchor {
            Some((epoch, at)) => epoch + at.elapsed().as_secs(),
            None => 0,
        }
    }

    fn uptime_millis(&self) -> u64 {
        Instant::now().as_millis()
    }
}
