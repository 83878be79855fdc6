//! HTTP transport seam for the ingestion POST
//!
//! The reporter only sees [`Transport`]. The firmware implements it with an
//! HTTP client over the network stack, the simulator and tests with fakes.

use alloc::string::String;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("network link is down")]
    NotConnected,
    #[error("URL is not a valid http:// or https:// URL")]
    InvalidUrl,
    #[error("DNS lookup failed")]
    Dns,
    #[error("TLS handshake or record failure")]
    Tls,
    #[error("socket I/O failed")]
    Io,
    #[error("malformed HTTP response")]
    MalformedResponse,
}

/// Status code and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Raw HTTP transport.
pub trait Transport {
    /// Issue one POST. `Err` means no status code was received.
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> impl Future<Output = Result<HttpResponse, TransportError>>;
}

/// Check that `url` is something the transport can reach.
pub fn check_url(url: &str) -> Result<(), TransportError> {
    match nourl::Url::parse(url) {
        Ok(parsed) if !parsed.host().is_empty() => Ok(()),
        _ => Err(TransportError::InvalidUrl),
    }
}
