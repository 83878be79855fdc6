//! ADC1 oneshot sample source

use amp_core::sensors::{AdcSource, SensorError};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::peripherals::ADC1;

/// One analog input on ADC1, read in blocking oneshot mode.
///
/// A conversion takes a few microseconds, well below the 500 µs spacing of
/// the RMS burst, so blocking inside the async read is harmless.
pub struct EspAdcSource<'d, P> {
    adc: Adc<'d, ADC1<'d>, Blocking>,
    pin: AdcPin<P, ADC1<'d>>,
}

impl<'d, P: AdcChannel> EspAdcSource<'d, P> {
    pub fn new(adc: Adc<'d, ADC1<'d>, Blocking>, pin: AdcPin<P, ADC1<'d>>) -> Self {
        Self { adc, pin }
    }
}

impl<P: AdcChannel> AdcSource for EspAdcSource<'_, P> {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| SensorError::ReadFailed {
            sensor: "ADC1",
            details: "oneshot conversion failed",
        })
    }
}
