//! HTTP and HTTPS transport through `reqwless` on the `embassy-net` stack

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use amp_core::report::{HttpResponse, Transport, TransportError};
use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_time::{Duration, with_timeout};
use log::warn;
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::{Method, RequestBuilder};

pub const TCP_BUFFER: usize = 4096;
/// One full TLS record (16 KiB plaintext plus record overhead).
pub const TLS_BUFFER: usize = 16_640;
/// Response head and body. Bodies are only logged.
const RESPONSE_BUFFER: usize = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub type TcpConnections<'d> = TcpClient<'d, 1, TCP_BUFFER, TCP_BUFFER>;
pub type TcpConnectionState = TcpClientState<1, TCP_BUFFER, TCP_BUFFER>;

/// One request per connection. `https://` URLs go through TLS 1.3; the
/// server certificate is not verified.
pub struct HttpTransport<'d> {
    stack: Stack<'d>,
    client: HttpClient<'d, TcpConnections<'d>, DnsSocket<'d>>,
    rx_buffer: Vec<u8>,
}

impl<'d> HttpTransport<'d> {
    pub fn new(
        stack: Stack<'d>,
        tcp: &'d TcpConnections<'d>,
        dns: &'d DnsSocket<'d>,
        tls_read: &'d mut [u8],
        tls_write: &'d mut [u8],
        seed: u64,
    ) -> Self {
        let tls = TlsConfig::new(seed, tls_read, tls_write, TlsVerify::None);
        Self {
            stack,
            client: HttpClient::new_with_tls(tcp, dns, tls),
            rx_buffer: vec![0; RESPONSE_BUFFER],
        }
    }
}

fn transport_error(e: reqwless::Error) -> TransportError {
    warn!("HTTP client error: {:?}", e);
    match e {
        reqwless::Error::Dns => TransportError::Dns,
        reqwless::Error::Tls(_) => TransportError::Tls,
        reqwless::Error::InvalidUrl(_) => TransportError::InvalidUrl,
        reqwless::Error::Codec => TransportError::MalformedResponse,
        _ => TransportError::Io,
    }
}

impl Transport for HttpTransport<'_> {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        if !self.stack.is_config_up() {
            return Err(TransportError::NotConnected);
        }

        let client = &mut self.client;
        let rx_buffer = &mut self.rx_buffer;
        let exchange = async move {
            let mut request = client
                .request(Method::POST, url)
                .await
                .map_err(transport_error)?
                .headers(headers)
                .body(body);
            let response = request.send(rx_buffer).await.map_err(transport_error)?;
            let status = response.status.0;
            let body = response
                .body()
                .read_to_end()
                .await
                .map_err(transport_error)?;
            Ok(HttpResponse {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            })
        };

        match with_timeout(REQUEST_TIMEOUT, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("HTTP request timed out after {} s", REQUEST_TIMEOUT.as_secs());
                Err(TransportError::Io)
            }
        }
    }
}
