//! Bakes device secrets into the firmware image.
//!
//! Values come from the process environment or, failing that, a `.env` file
//! found by walking up from the crate directory. Missing values are emitted
//! empty so the build succeeds; the firmware refuses to start without them.

const SECRETS: [&str; 5] = ["WIFI_SSID", "WIFI_PASSWORD", "API_KEY", "DEVICE_ID", "INGEST_URL"];

fn main() {
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in SECRETS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = match std::env::var(key) {
            Ok(value) => value,
            Err(_) => {
                println!("cargo:warning={key} is not set; the firmware will not start without it");
                String::new()
            }
        };
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
