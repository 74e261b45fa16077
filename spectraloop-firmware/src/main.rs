//! SpectraLoop - Maglev Test Vehicle Firmware
//!
//! Main firmware binary for RP2040-based vehicle controllers. Drives six
//! ESCs behind a safety interlock, watches two DS18B20 probes and counts
//! track reflectors, all under commands from a host on UART0.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output, Pull};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::{self, Common, Pio};
use embassy_rp::pio_programs::onewire::{PioOneWire, PioOneWireProgram};
use embassy_rp::pwm::Pwm;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use heapless::Vec;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use spectraloop_core::config::{parse_config, VehicleConfig};
use spectraloop_core::controller::Controller;
use spectraloop_core::traits::BoardParts;

use crate::board::{
    esc, esc_pwm_config, probe, switch, ProbeLink, ReflectorAdc, VehicleBoard,
};

/// Embedded configuration (compiled into firmware)
/// Edit vehicle.toml and rebuild to customize
const VEHICLE_CONFIG: &str = include_str!("../vehicle.toml");

mod board;
mod channels;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// PIO0 holds the 1-Wire program for as long as the probes run
static PIO_COMMON: StaticCell<Common<'static, PIO0>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("SpectraLoop firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Host link (115200 8N1 default)
    let tx_buf = TX_BUF.init([0u8; 1024]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("UART initialized for host communication");

    // One PWM slice per ESC, output A
    let escs: Vec<_, 6> = [
        esc(Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, esc_pwm_config())),
        esc(Pwm::new_output_a(p.PWM_SLICE2, p.PIN_4, esc_pwm_config())),
        esc(Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, esc_pwm_config())),
        esc(Pwm::new_output_a(p.PWM_SLICE4, p.PIN_8, esc_pwm_config())),
        esc(Pwm::new_output_a(p.PWM_SLICE5, p.PIN_10, esc_pwm_config())),
        esc(Pwm::new_output_a(p.PWM_SLICE6, p.PIN_12, esc_pwm_config())),
    ]
    .into_iter()
    .collect();
    info!("ESC outputs initialized");

    // Temperature probes, one PIO state machine per bus
    let Pio { common, sm0, sm1, .. } = Pio::new(p.PIO0, Irqs);
    let common = PIO_COMMON.init(common);
    let onewire = PioOneWireProgram::new(common);
    let first_probe = probe(PioOneWire::new(common, sm0, p.PIN_14, &onewire));
    let second_probe = probe(PioOneWire::new(common, sm1, p.PIN_15, &onewire));
    info!("1-Wire buses initialized on PIO0");

    let probes: Vec<_, 2> = [ProbeLink::new(0), ProbeLink::new(1)].into_iter().collect();

    let reflector = ReflectorAdc::new(
        Adc::new_blocking(p.ADC, adc::Config::default()),
        adc::Channel::new_pin(p.PIN_26, Pull::None),
    );

    let parts = BoardParts::<VehicleBoard> {
        probes,
        reflector,
        escs,
        relay: switch(Output::new(p.PIN_16, Level::Low)),
        buzzer: switch(Output::new(p.PIN_17, Level::Low)),
        led: switch(Output::new(p.PIN_25, Level::Low)),
    };
    let controller = Controller::new(config, parts, tasks::now_ms());
    info!("Controller initialized, relay off, motors neutral");

    spawner.spawn(tasks::probe_task(first_probe, second_probe)).unwrap();
    spawner.spawn(tasks::serial_rx_task(rx)).unwrap();
    spawner.spawn(tasks::serial_tx_task(tx)).unwrap();
    spawner.spawn(tasks::control_task(controller)).unwrap();

    info!("All tasks spawned, firmware running");
}

/// Parse the embedded configuration
///
/// vehicle.toml is validated at build time, so a failure here means the
/// on-target parser disagrees with the build check. Defaults are safe.
fn load_config() -> VehicleConfig {
    match parse_config(VEHICLE_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using built-in default configuration");
            VehicleConfig::default()
        }
    }
}
