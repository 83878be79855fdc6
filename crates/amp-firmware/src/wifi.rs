//! Wi-Fi station link

use amp_core::config::InternetConfig;
use amp_core::link::Connectivity;
use embassy_net::Stack;
use embassy_time::{Duration, with_timeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiError};
use log::{info, warn};

/// How long to wait for a DHCP lease after association.
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);

/// Station-mode controller plus the IP stack riding on it.
///
/// The link counts as connected only when the radio is associated and the
/// stack holds an IPv4 configuration.
pub struct WifiLink<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
}

impl<'d> WifiLink<'d> {
    pub fn new(
        mut controller: WifiController<'d>,
        stack: Stack<'d>,
        internet: &InternetConfig<'_>,
    ) -> Result<Self, WifiError> {
        let client = ClientConfig::default()
            .with_ssid(internet.ssid.into())
            .with_password(internet.password.into());
        controller.set_config(&ModeConfig::Client(client))?;
        Ok(Self { controller, stack })
    }
}

impl Connectivity for WifiLink<'_> {
    fn is_connected(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }

    async fn connect(&mut self) -> bool {
        if !matches!(self.controller.is_started(), Ok(true)) {
            if let Err(e) = self.controller.start_async().await {
                warn!("WiFi start failed: {:?}", e);
                return false;
            }
            info!("WiFi started in station mode");
        }

        if !matches!(self.controller.is_connected(), Ok(true)) {
            if let Err(e) = self.controller.connect_async().await {
                warn!("WiFi association failed: {:?}", e);
                return false;
            }
        }

        if with_timeout(DHCP_TIMEOUT, self.stack.wait_config_up()).await.is_err() {
            warn!("No DHCP lease after {} s", DHCP_TIMEOUT.as_secs());
            return false;
        }

        if let Some(config) = self.stack.config_v4() {
            info!("WiFi connected, IP {}", config.address);
        }
        if let Some(rssi) = self.rssi() {
            info!("Signal strength (RSSI): {} dBm", rssi);
        }
        true
    }

    fn rssi(&self) -> Option<i32> {
        self.controller.rssi().ok()
    }
}
