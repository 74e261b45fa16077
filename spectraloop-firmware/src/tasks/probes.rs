//! Temperature probe task
//!
//! Owns both 1-Wire buses and converts back to back: start both probes,
//! wait out the conversion, read both, publish. Bus slots are generated
//! by the PIO, so every transaction awaits instead of spinning and the
//! control task keeps its 1 ms tick.

use defmt::*;
use embassy_time::Timer;
use portable_atomic::Ordering;

use spectraloop_core::traits::SensorError;
use spectraloop_drivers::sensor::{Ds18b20, OneWireBus, CONVERSION_MS};

use crate::board::PioProbe;
use crate::channels::{PROBES_READY, PROBE_PRESENT, PROBE_READINGS};

#[embassy_executor::task]
pub async fn probe_task(mut first: PioProbe<0>, mut second: PioProbe<1>) {
    info!("Probe task started");

    let present = [first.configure().await.is_ok(), second.configure().await.is_ok()];
    for (i, &found) in present.iter().enumerate() {
        PROBE_PRESENT[i].store(found, Ordering::Relaxed);
        if found {
            info!("Probe {} present", i + 1);
        } else {
            warn!("Probe {} not found", i + 1);
        }
    }
    PROBES_READY.signal(());

    loop {
        let started = [first.start_conversion().await, second.start_conversion().await];
        Timer::after_millis(CONVERSION_MS as u64).await;
        publish(0, started[0], &mut first).await;
        publish(1, started[1], &mut second).await;
    }
}

/// Collect one probe and hand the result to the control task
async fn publish<B: OneWireBus>(
    index: usize,
    started: Result<(), SensorError>,
    probe: &mut Ds18b20<B>,
) {
    let reading = match started {
        Ok(()) => probe.read_temperature().await,
        Err(e) => Err(e),
    };
    if let Err(e) = reading {
        trace!("Probe {} read failed: {:?}", index + 1, e);
    }
    PROBE_PRESENT[index].store(probe.is_present(), Ordering::Relaxed);
    PROBE_READINGS[index].signal(reading);
}
