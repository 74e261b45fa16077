//! Inter-task communication channels
//!
//! Lines flow from the serial receiver to the control task, responses
//! from the control task to the serial transmitter. Temperature readings
//! flow from the probe task to the control task.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU32};

use spectraloop_core::traits::SensorError;
use spectraloop_protocol::{Line, Response};

/// Number of temperature probe buses
pub const PROBE_COUNT: usize = 2;

/// Channel capacity for received lines
const INBOUND_CHANNEL_SIZE: usize = 8;

/// Channel capacity for outbound responses
const OUTBOUND_CHANNEL_SIZE: usize = 32;

/// Complete lines from the host, waiting for the command cooldown
pub static INBOUND: Channel<CriticalSectionRawMutex, Line, INBOUND_CHANNEL_SIZE> = Channel::new();

/// Responses waiting for the UART
pub static OUTBOUND: Channel<CriticalSectionRawMutex, Response, OUTBOUND_CHANNEL_SIZE> =
    Channel::new();

/// Lines lost to overflow (too long, or inbound queue full)
pub static DROPPED_LINES: AtomicU32 = AtomicU32::new(0);

type ProbeReading = Signal<CriticalSectionRawMutex, Result<f32, SensorError>>;

/// Latest finished conversion per probe (updated by probe task)
/// Taken by the control task; an empty signal means still converting
pub static PROBE_READINGS: [ProbeReading; PROBE_COUNT] = [ProbeReading::new(), ProbeReading::new()];

/// Whether each probe answered its last reset (updated by probe task)
pub static PROBE_PRESENT: [AtomicBool; PROBE_COUNT] =
    [AtomicBool::new(false), AtomicBool::new(false)];

/// Raised once the probe task has looked for every probe
pub static PROBES_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
