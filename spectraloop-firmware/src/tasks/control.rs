//! Vehicle control task
//!
//! Owns the controller. Every millisecond it takes at most one queued
//! host line (once the command cooldown has passed), runs the periodic
//! tasks that are due, and hands the responses to the serial transmitter.
//! Nothing in the loop waits on a bus; temperature readings arrive from
//! the probe task.

use defmt::*;
use embassy_time::{with_timeout, Duration, Instant, Ticker};
use heapless::Vec;
use portable_atomic::Ordering;

use spectraloop_core::controller::Controller;
use spectraloop_protocol::Response;

use crate::board::VehicleBoard;
use crate::channels::{DROPPED_LINES, INBOUND, OUTBOUND, PROBES_READY};

/// Control loop period
const CONTROL_PERIOD_MS: u64 = 1;

/// Longest wait for the probe task's first presence check
const PROBE_WAIT_MS: u64 = 500;

/// Responses collected in one pass
const OUTBOX_SIZE: usize = 24;

type Outbox = Vec<Response, OUTBOX_SIZE>;

/// Milliseconds since boot, wrapping after about 49 days
pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

#[embassy_executor::task]
pub async fn control_task(mut controller: Controller<VehicleBoard>) {
    info!("Control task started");

    // Boot reports which probes answered
    let ready = with_timeout(Duration::from_millis(PROBE_WAIT_MS), PROBES_READY.wait()).await;
    if ready.is_err() {
        warn!("Probe task not ready, booting without probes");
    }

    let mut outbox = Outbox::new();
    controller.boot(now_ms(), &mut outbox);
    flush(&mut outbox);

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_PERIOD_MS));

    loop {
        ticker.next().await;
        let now = now_ms();

        controller.set_dropped_lines(DROPPED_LINES.load(Ordering::Relaxed));

        if controller.accepts_command(now) {
            if let Ok(line) = INBOUND.try_receive() {
                debug!("Command: {}", line.as_str());
                controller.handle_line(&line, now, &mut outbox);
            }
        }

        controller.tick(now, &mut outbox);
        flush(&mut outbox);
    }
}

/// Log and queue every collected response
fn flush(outbox: &mut Outbox) {
    for response in core::mem::take(outbox) {
        log_response(&response);
        if OUTBOUND.try_send(response).is_err() {
            warn!("Outbound queue full, response dropped");
        }
    }
}

/// Mirror a response to the debug log at its severity
fn log_response(response: &Response) {
    match response {
        Response::EmergencyStop { .. }
        | Response::TemperatureAlarm { .. }
        | Response::RelayFault { .. } => error!("{:?}", response),

        Response::Refused { .. }
        | Response::Malformed { .. }
        | Response::InvalidMotor(_)
        | Response::Error(_)
        | Response::Sensor { .. }
        | Response::BypassEngaged(_)
        | Response::RelayReasserted => warn!("{:?}", response),

        Response::Armed { .. }
        | Response::Disarmed { .. }
        | Response::Brake { .. }
        | Response::RelayBrake { .. }
        | Response::TemperatureSafe { .. }
        | Response::MonitoringRestored(_)
        | Response::MotorStarted { .. }
        | Response::MotorStopped { .. }
        | Response::GroupStarted { .. }
        | Response::GroupStopped { .. }
        | Response::ReflectorReset
        | Response::ReflectorCalibration(_)
        | Response::SensorProbe { .. }
        | Response::ReflectorBaseline { .. }
        | Response::Ready => info!("{:?}", response),

        Response::DualTemp(_)
        | Response::ReflectorStatus(_)
        | Response::ReflectorDetected { .. }
        | Response::Heartbeat(_)
        | Response::Performance(_) => trace!("{:?}", response),

        _ => debug!("{:?}", response),
    }
}
