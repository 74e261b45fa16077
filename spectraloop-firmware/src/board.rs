//! RP2040 vehicle board
//!
//! Binds the core hardware traits to embassy-rp peripherals. The
//! temperature probes are driven by their own task; the controller
//! sees them through [`ProbeLink`].
//!
//! | Function        | GPIO                 | Peripheral         |
//! |-----------------|----------------------|--------------------|
//! | Host serial     | 0 (TX), 1 (RX)       | UART0, 115200 8N1  |
//! | ESC 1-6         | 2, 4, 6, 8, 10, 12   | PWM slices 1-6 A   |
//! | Temp sensor 1-2 | 14, 15               | 1-Wire, PIO0 SM0-1 |
//! | Relay brake     | 16                   | Output             |
//! | Buzzer          | 17                   | Output             |
//! | Reflector LED   | 25                   | Output (onboard)   |
//! | Reflector input | 26                   | ADC0               |

use embassy_rp::adc::{self, Adc, Blocking};
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio_programs::onewire::PioOneWire;
use embassy_rp::pwm::{self, Pwm, PwmOutput};
use portable_atomic::Ordering;
use spectraloop_core::traits::{AnalogInput, Board, SensorError, TemperatureProbe};
use spectraloop_drivers::motor::{Esc, ESC_PERIOD_US};
use spectraloop_drivers::output::GpioSwitch;
use spectraloop_drivers::sensor::{Ds18b20, OneWireBus};

use crate::channels::{PROBE_PRESENT, PROBE_READINGS};

/// PWM counter rate for ESC slices (1 MHz, one count per microsecond)
const PWM_DIVIDER: u8 = 125;

/// The vehicle controller board
pub struct VehicleBoard;

impl Board for VehicleBoard {
    type Probe = ProbeLink;
    type Reflector = ReflectorAdc;
    type Esc = Esc<PwmOutput<'static>>;
    type Relay = GpioSwitch<Output<'static>>;
    type Buzzer = GpioSwitch<Output<'static>>;
    type Led = GpioSwitch<Output<'static>>;
}

/// 1-Wire bus on a PIO state machine
pub struct PioBus<const SM: usize>(PioOneWire<'static, PIO0, SM>);

impl<const SM: usize> OneWireBus for PioBus<SM> {
    async fn reset(&mut self) -> bool {
        self.0.reset().await
    }

    async fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.write_bytes(bytes).await
    }

    async fn read_bytes(&mut self, buf: &mut [u8]) {
        self.0.read_bytes(buf).await
    }
}

/// DS18B20 on its own PIO-driven pin
pub type PioProbe<const SM: usize> = Ds18b20<PioBus<SM>>;

pub fn probe<const SM: usize>(wire: PioOneWire<'static, PIO0, SM>) -> PioProbe<SM> {
    Ds18b20::new(PioBus(wire))
}

/// Control-side handle on a probe owned by the probe task
///
/// Never touches the bus. Presence and readings are whatever the probe
/// task published last.
pub struct ProbeLink {
    index: usize,
}

impl ProbeLink {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl TemperatureProbe for ProbeLink {
    fn probe(&mut self) -> bool {
        PROBE_PRESENT[self.index].load(Ordering::Relaxed)
    }

    /// The probe task converts continuously, so there is nothing to start
    fn request_conversion(&mut self) -> Result<(), SensorError> {
        if self.probe() {
            Ok(())
        } else {
            Err(SensorError::NotPresent)
        }
    }

    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        PROBE_READINGS[self.index]
            .try_take()
            .unwrap_or(Err(SensorError::Busy))
    }
}

/// Reflector sensor on an ADC pin
pub struct ReflectorAdc {
    adc: Adc<'static, Blocking>,
    channel: adc::Channel<'static>,
}

impl ReflectorAdc {
    pub fn new(adc: Adc<'static, Blocking>, channel: adc::Channel<'static>) -> Self {
        Self { adc, channel }
    }
}

impl AnalogInput for ReflectorAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.adc
            .blocking_read(&mut self.channel)
            .map_err(|_| SensorError::Bus)
    }
}

/// PWM configuration for a 50 Hz servo frame, starting at neutral
pub fn esc_pwm_config() -> pwm::Config {
    let mut config = pwm::Config::default();
    config.divider = PWM_DIVIDER.into();
    config.top = ESC_PERIOD_US;
    config.compare_a = 1000;
    config
}

/// ESC on the A output of a PWM slice
pub fn esc(pwm: Pwm<'static>) -> Esc<PwmOutput<'static>> {
    let (a, _) = pwm.split();
    Esc::new(a.expect("ESC slice configured without output A"))
}

/// Active-high switch output
pub fn switch(pin: Output<'static>) -> GpioSwitch<Output<'static>> {
    GpioSwitch::new_active_high(pin)
}
