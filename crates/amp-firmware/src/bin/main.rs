#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use amp_core::sampling::{RmsEstimator, RmsSampler};
use amp_core::sensors::CurrentSensor;
use amp_core::EnergyMonitor;
use amp_firmware::adc::EspAdcSource;
use amp_firmware::http::{HttpTransport, TLS_BUFFER, TcpConnectionState, TcpConnections};
use amp_firmware::secrets;
use amp_firmware::sntp::SntpClock;
use amp_firmware::wifi::WifiLink;
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_net::StackResources;
use embassy_net::dns::DnsSocket;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use static_cell::{ConstStaticCell, StaticCell};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static TCP_STATE: StaticCell<TcpConnectionState> = StaticCell::new();
static TCP_CLIENT: StaticCell<TcpConnections<'static>> = StaticCell::new();
static DNS_SOCKET: StaticCell<DnsSocket<'static>> = StaticCell::new();
static TLS_READ: ConstStaticCell<[u8; TLS_BUFFER]> = ConstStaticCell::new([0; TLS_BUFFER]);
static TLS_WRITE: ConstStaticCell<[u8; TLS_BUFFER]> = ConstStaticCell::new([0; TLS_BUFFER]);

/// Wait out the grace period, then reset the chip.
async fn restart(delay_ms: u32) -> ! {
    error!("Restarting in {} ms", delay_ms);
    Timer::after(Duration::from_millis(u64::from(delay_ms))).await;
    esp_hal::system::software_reset()
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = secrets::device_config();
    if let Err(e) = config.validate() {
        // Rebooting cannot fix baked-in configuration.
        loop {
            error!("Invalid configuration: {}", e);
            Timer::after(Duration::from_secs(60)).await;
        }
    }

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    // Current sensor on GPIO4 (ADC1 channel 3), full 0-3.3 V range.
    let mut adc_config = AdcConfig::new();
    let pin = adc_config.enable_pin(peripherals.GPIO4, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let sensor = CurrentSensor::new(EspAdcSource::new(adc, pin), config.sensor);
    let source = RmsSampler::new(sensor, RmsEstimator::from_config(&config.sampling));

    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, mut runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );

    let link = WifiLink::new(controller, stack, &config.internet)
        .expect("Failed to configure Wi-Fi station");
    let clock = SntpClock::new(stack, config.clock.ntp_server);
    let tcp = TCP_CLIENT.init(TcpConnections::new(stack, TCP_STATE.init(TcpConnectionState::new())));
    let dns = DNS_SOCKET.init(DnsSocket::new(stack));
    let tls_seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let transport = HttpTransport::new(
        stack,
        tcp,
        dns,
        TLS_READ.take(),
        TLS_WRITE.take(),
        tls_seed,
    );

    let mut monitor = EnergyMonitor::new(&config, source, Delay, clock, link, transport);

    let app = async {
        if let Err(e) = monitor.boot().await {
            error!("Boot failed: {}", e);
            return;
        }
        monitor.run_forever().await;
    };

    // The network runner never returns; `app` only does on a fatal error.
    select(runner.run(), app).await;
    restart(config.link.restart_delay_ms).await
}
