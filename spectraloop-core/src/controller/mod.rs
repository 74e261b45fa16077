//! Vehicle controller
//!
//! Owns every subsystem and is the only place where they meet: host
//! commands come in through [`Controller::handle_line`], periodic work
//! through [`Controller::tick`], and everything the vehicle has to say
//! goes out as [`Response`] values through an [`Outbox`].
//!
//! The controller itself is synchronous and never blocks. The firmware
//! calls it from a single task, so no component is ever touched
//! concurrently.

mod dispatch;
mod tasks;

#[cfg(test)]
mod tests;

use spectraloop_protocol::{
    HeartbeatReport, PerformanceReport, Response, StatusReport, TempPair, ThermalReport,
};

use crate::alert::Annunciator;
use crate::config::VehicleConfig;
use crate::motor::MotorBank;
use crate::reflector::ReflectorCounter;
use crate::safety::{SafetyInterlock, ThermalView};
use crate::scheduler::Schedule;
use crate::state::InterlockState;
use crate::thermal::{MonitoringMode, TemperatureMonitor, ThermalEvent, ThermalEvents};
use crate::traits::{Board, BoardParts};

/// Sink for outbound responses
pub trait Outbox {
    /// Queue a response; a full outbox drops it
    fn send(&mut self, response: Response);
}

impl<const N: usize> Outbox for heapless::Vec<Response, N> {
    fn send(&mut self, response: Response) {
        let _ = self.push(response);
    }
}

/// Read-only snapshot of the vehicle state
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemState {
    pub armed: bool,
    pub brake_active: bool,
    pub relay_brake_active: bool,
    pub temperature_alarm: bool,
    pub buzzer_active: bool,
    pub monitoring: MonitoringMode,
    pub interlock: InterlockState,
}

/// The vehicle controller
pub struct Controller<B: Board> {
    config: VehicleConfig,
    thermal: TemperatureMonitor<B::Probe>,
    reflector: ReflectorCounter<B::Reflector>,
    interlock: SafetyInterlock<B::Relay>,
    motors: MotorBank<B::Esc>,
    annunciator: Annunciator<B::Buzzer, B::Led>,
    schedule: Schedule,

    boot_ms: u32,
    last_command_ms: Option<u32>,

    loops: u32,
    loop_window_ms: u32,
    loop_hz: f32,
    temp_reads_mark: u32,
    temp_stats_ms: u32,
    temp_read_hz: f32,
    dropped_lines: u32,
}

impl<B: Board> Controller<B> {
    /// Assemble the controller; outputs start safe (relay off, motors neutral)
    pub fn new(config: VehicleConfig, parts: BoardParts<B>, now_ms: u32) -> Self {
        Self {
            thermal: TemperatureMonitor::new(config.thermal, parts.probes),
            reflector: ReflectorCounter::new(parts.reflector, config.reflector),
            interlock: SafetyInterlock::new(parts.relay, &config.thermal),
            motors: MotorBank::new(config.motors, parts.escs),
            annunciator: Annunciator::new(parts.buzzer, parts.led),
            schedule: Schedule::new(&config.timing, now_ms),
            config,
            boot_ms: now_ms,
            last_command_ms: None,
            loops: 0,
            loop_window_ms: now_ms,
            loop_hz: 0.0,
            temp_reads_mark: 0,
            temp_stats_ms: now_ms,
            temp_read_hz: 0.0,
            dropped_lines: 0,
        }
    }

    /// Probe the sensors and announce the vehicle
    pub fn boot(&mut self, now_ms: u32, outbox: &mut impl Outbox) {
        outbox.send(Response::Banner);

        let mut events = ThermalEvents::new();
        let probed = self.thermal.init(now_ms, &mut events);
        for (i, connected) in probed.iter().enumerate() {
            outbox.send(Response::SensorProbe {
                sensor: i as u8 + 1,
                connected: *connected,
            });
        }
        self.forward(&events, outbox);
        self.thermal.request_readings(now_ms, &mut events);

        // Failure shows up as an inactive counter in the reports
        let _ = self.reflector.sample(now_ms);
        let rc = self.reflector.config();
        outbox.send(Response::ReflectorBaseline {
            raw: self.reflector.raw(),
            voltage: self.reflector.voltage(),
            detect_v: rc.code_to_volts(rc.detect_threshold),
            release_v: rc.code_to_volts(rc.release_threshold),
        });

        outbox.send(Response::Ready);
    }

    /// Run every periodic task that is due
    pub fn tick(&mut self, now_ms: u32, outbox: &mut impl Outbox) {
        self.loops = self.loops.wrapping_add(1);
        for task in self.schedule.poll(now_ms) {
            self.run_task(task, now_ms, outbox);
        }
    }

    /// Check whether the command cooldown has passed
    ///
    /// Lines that arrive during the cooldown wait in the inbound queue.
    pub fn accepts_command(&self, now_ms: u32) -> bool {
        self.last_command_ms.map_or(true, |last| {
            now_ms.wrapping_sub(last) > self.config.timing.command_cooldown_ms
        })
    }

    /// Update the dropped-line counter kept by the serial link
    pub fn set_dropped_lines(&mut self, dropped: u32) {
        self.dropped_lines = dropped;
    }

    pub fn system_state(&self) -> SystemState {
        SystemState {
            armed: self.interlock.armed(),
            brake_active: self.interlock.brake_active(),
            relay_brake_active: self.interlock.relay_active(),
            temperature_alarm: self.thermal.alarm(),
            buzzer_active: self.annunciator.buzzer_active(),
            monitoring: self.thermal.mode(),
            interlock: self.interlock.state(),
        }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    fn thermal_view(&self) -> ThermalView {
        let fused = self.thermal.fused();
        ThermalView {
            fused_c: fused.value,
            alarm: self.thermal.alarm(),
            mandatory: self.thermal.is_mandatory(),
            live: fused.live,
        }
    }

    fn temps(&self) -> TempPair {
        self.thermal.temp_pair()
    }

    fn reflector_count(&self) -> u64 {
        self.reflector.count()
    }

    fn thermal_report(&self) -> ThermalReport {
        ThermalReport {
            temps: self.temps(),
            alarm: self.thermal.alarm(),
            buzzer: self.annunciator.buzzer_active(),
            connected: self.thermal.connected(),
            bypassed: !self.thermal.is_mandatory(),
            read_count: self.thermal.read_count(),
            alarm_count: self.thermal.alarm_count(),
            read_freq_hz: self.temp_read_hz,
            peak: self.thermal.peaks(),
            reflector: self.reflector.report(),
        }
    }

    fn status_report(&self) -> StatusReport {
        StatusReport {
            armed: self.interlock.armed(),
            brake: self.interlock.brake_active(),
            relay: self.interlock.relay_active(),
            thermal: self.thermal_report(),
            lev_speed: self.motors.group_speed(spectraloop_protocol::Group::Levitation),
            thr_speed: self.motors.group_speed(spectraloop_protocol::Group::Thrust),
            motors: self.motors.snapshot(),
        }
    }

    fn heartbeat_report(&self, now_ms: u32) -> HeartbeatReport {
        HeartbeatReport {
            uptime_s: now_ms.wrapping_sub(self.boot_ms) / 1000,
            armed: self.interlock.armed(),
            brake: self.interlock.brake_active(),
            relay: self.interlock.relay_active(),
            temps: self.temps(),
            alarm: self.thermal.alarm(),
            active_motors: self.motors.running_count(),
            reflector_count: self.reflector.count(),
            reflector_avg_rpm: self.reflector.average_rpm(),
        }
    }

    fn performance_report(&self) -> PerformanceReport {
        PerformanceReport {
            loop_hz: self.loop_hz,
            temp_read_hz: self.temp_read_hz,
            connected: self.thermal.connected(),
            reflector_read_hz: self.reflector.read_freq_hz(),
            reflector_count: self.reflector.count(),
            dropped_lines: self.dropped_lines,
        }
    }

    /// Turn monitor events into responses, acting on alarm changes
    fn forward(&mut self, events: &[ThermalEvent], outbox: &mut impl Outbox) {
        for event in events {
            self.on_thermal_event(*event, outbox);
        }
    }

    fn on_thermal_event(&mut self, event: ThermalEvent, outbox: &mut impl Outbox) {
        use spectraloop_protocol::{SensorNotice, StopCause};

        let sensor = |i: u8| i + 1;
        let response = match event {
            ThermalEvent::SensorDisconnected(i) => Response::Sensor {
                sensor: sensor(i),
                notice: SensorNotice::Disconnected,
            },
            ThermalEvent::SensorStale(i) => Response::Sensor {
                sensor: sensor(i),
                notice: SensorNotice::Stale,
            },
            ThermalEvent::SensorRecovered(i) => Response::Sensor {
                sensor: sensor(i),
                notice: SensorNotice::Recovered,
            },
            ThermalEvent::BypassEngaged(cause) => Response::BypassEngaged(cause),
            ThermalEvent::MonitoringRestored(cause) => Response::MonitoringRestored(cause),
            ThermalEvent::AlarmRaised { .. } => {
                self.annunciator.raise();
                self.interlock.emergency_stop(&mut self.motors);
                outbox.send(Response::EmergencyStop {
                    cause: StopCause::Temperature,
                    temps: self.temps(),
                    reflector: self.reflector_count(),
                });
                Response::TemperatureAlarm {
                    temps: self.temps(),
                    reflector: self.reflector_count(),
                }
            }
            ThermalEvent::AlarmCleared { .. } => {
                self.annunciator.clear();
                Response::TemperatureSafe {
                    temps: self.temps(),
                    reflector: self.reflector_count(),
                }
            }
        };
        outbox.send(response);
    }
}
