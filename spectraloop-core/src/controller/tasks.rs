//! Periodic task handlers

use spectraloop_protocol::Response;

use super::{Controller, Outbox};
use crate::scheduler::Task;
use crate::thermal::ThermalEvents;
use crate::traits::Board;

impl<B: Board> Controller<B> {
    /// Run one periodic task
    pub fn run_task(&mut self, task: Task, now_ms: u32, outbox: &mut impl Outbox) {
        match task {
            Task::Reflector => self.sample_reflector(now_ms, outbox),
            Task::Temperature => self.update_temperature(now_ms, outbox),
            Task::HealthCheck => {
                let mut events = ThermalEvents::new();
                self.thermal.check_health(now_ms, &mut events);
                self.forward(&events, outbox);
                if let Some(event) = self.interlock.reconcile(&mut self.motors) {
                    self.on_interlock_event(event, outbox);
                }
            }
            Task::Recovery => {
                let mut events = ThermalEvents::new();
                self.thermal.attempt_recovery(now_ms, &mut events);
                self.forward(&events, outbox);
            }
            Task::Buzzer => self.annunciator.tick(self.thermal.alarm()),
            Task::TemperatureReport => {
                let max_interval = self.config.timing.temperature_report_max_ms;
                if self.thermal.take_report(now_ms, max_interval) {
                    outbox.send(Response::DualTemp(self.temps()));
                }
            }
            Task::ReflectorReport => {
                outbox.send(Response::ReflectorStatus(self.reflector.report()));
            }
            Task::Heartbeat => outbox.send(Response::Heartbeat(self.heartbeat_report(now_ms))),
            Task::Performance => {
                let elapsed = now_ms.wrapping_sub(self.loop_window_ms);
                if elapsed > 0 {
                    self.loop_hz = self.loops as f32 * 1000.0 / elapsed as f32;
                }
                self.loops = 0;
                self.loop_window_ms = now_ms;
                outbox.send(Response::Performance(self.performance_report()));
            }
            Task::Stats => {
                self.reflector.update_stats(now_ms);
                let elapsed = now_ms.wrapping_sub(self.temp_stats_ms);
                if elapsed > 0 {
                    let reads = self.thermal.read_count().wrapping_sub(self.temp_reads_mark);
                    self.temp_read_hz = reads as f32 * 1000.0 / elapsed as f32;
                }
                self.temp_reads_mark = self.thermal.read_count();
                self.temp_stats_ms = now_ms;
            }
        }
    }

    fn sample_reflector(&mut self, now_ms: u32, outbox: &mut impl Outbox) {
        // A failed read marks the counter inactive; the next one retries
        if let Ok(Some(edge)) = self.reflector.sample(now_ms) {
            outbox.send(Response::ReflectorDetected {
                count: edge.count,
                voltage: edge.voltage,
                speed_rpm: edge.speed_rpm,
            });
        }
        self.annunciator.set_led(self.reflector.detected());

        if let Some(report) = self.reflector.take_calibration() {
            outbox.send(Response::ReflectorCalibration(report));
        }
    }

    /// Collect, evaluate, then start the next conversion
    fn update_temperature(&mut self, now_ms: u32, outbox: &mut impl Outbox) {
        let mut events = ThermalEvents::new();
        self.thermal.poll_readings(now_ms, &mut events);
        self.forward(&events, outbox);

        if let Some(event) = self.thermal.evaluate_safety() {
            self.on_thermal_event(event, outbox);
        }

        events.clear();
        self.thermal.request_readings(now_ms, &mut events);
        self.forward(&events, outbox);
    }
}
