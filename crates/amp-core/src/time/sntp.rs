//! SNTP packet codec (RFC 4330, client mode)
//!
//! Only the transmit timestamp of the reply is used; round-trip correction is
//! below the one-second resolution of the rendered timestamps.

use thiserror_no_std::Error;

pub const NTP_PORT: u16 = 123;
pub const NTP_PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Length of one NTP era in seconds.
const NTP_ERA: u64 = 1 << 32;

/// LI = 0, VN = 3, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0x1B;
const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;
const TRANSMIT_TIMESTAMP: usize = 40;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpError {
    #[error("DNS lookup for the time server failed")]
    Dns,
    #[error("UDP socket error")]
    Socket,
    #[error("no reply from the time server")]
    Timeout,
    #[error("reply is {0} bytes, expected at least 48")]
    ShortReply(usize),
    #[error("reply has unexpected mode {0}")]
    UnexpectedMode(u8),
    #[error("server sent a kiss-o'-death packet")]
    KissOfDeath,
    #[error("reply carries no transmit timestamp")]
    InvalidTimestamp,
}

/// A client request with every field except the header zeroed.
pub const fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Extract the server's transmit time as Unix seconds.
///
/// A transmit timestamp with the top bit clear is read as era 1 (from
/// 2036-02-07 on), which keeps the decoding valid until 2104.
pub fn parse_reply(reply: &[u8]) -> Result<u64, SntpError> {
    if reply.len() < NTP_PACKET_LEN {
        return Err(SntpError::ShortReply(reply.len()));
    }
    let mode = reply[0] & 0x07;
    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return Err(SntpError::UnexpectedMode(mode));
    }
    if reply[1] == 0 {
        return Err(SntpError::KissOfDeath);
    }

    let seconds = u32::from_be_bytes([
        reply[TRANSMIT_TIMESTAMP],
        reply[TRANSMIT_TIMESTAMP + 1],
        reply[TRANSMIT_TIMESTAMP + 2],
        reply[TRANSMIT_TIMESTAMP + 3],
    ]);
    if seconds == 0 {
        return Err(SntpError::InvalidTimestamp);
    }

    let seconds = if seconds & 0x8000_0000 == 0 {
        u64::from(seconds) + NTP_ERA
    } else {
        u64::from(seconds)
    };
    Ok(seconds - NTP_UNIX_OFFSET)
}
