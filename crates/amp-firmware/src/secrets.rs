//! Device secrets baked in at build time by `build.rs`.

use amp_core::Config;

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const API_KEY: &str = env!("API_KEY");
pub const DEVICE_ID: &str = env!("DEVICE_ID");
pub const INGEST_URL: &str = env!("INGEST_URL");

/// [`Config::DEFAULT`] with this device's identity and credentials.
pub fn device_config() -> Config<'static> {
    let mut config = Config::DEFAULT;
    config.internet.ssid = WIFI_SSID;
    config.internet.password = WIFI_PASSWORD;
    config.ingest.url = INGEST_URL;
    config.ingest.api_key = API_KEY;
    config.ingest.device_id = DEVICE_ID;
    config.ingest.firmware_version = env!("CARGO_PKG_VERSION");
    config
}
