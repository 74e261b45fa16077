//! Dual-channel temperature monitor
//!
//! Fuses up to two probe channels into one worst-case temperature and
//! owns the latched temperature alarm.
//!
//! The alarm uses hysteresis: it latches when the fused value reaches
//! `alarm_c` and clears only once it falls to `safe_c`. Since the fused
//! value is the maximum of all connected channels, one hot channel is
//! enough to raise the alarm and every channel has to be safe to clear it.
//!
//! When every channel is lost the monitor can fall back to a bypass mode
//! in which the temperature gate is skipped and a fixed fallback value is
//! reported. The bypass is visible in telemetry and can also be toggled
//! by the operator.

use heapless::Vec;
use spectraloop_protocol::{BypassCause, TempPair};

use super::channel::{ChannelUpdate, SensorChannel};
use crate::config::{ThermalConfig, MAX_TEMP_CHANNELS};
use crate::traits::TemperatureProbe;

/// Maximum events produced by one monitor call
pub const MAX_THERMAL_EVENTS: usize = 8;

/// Event buffer filled by monitor operations
pub type ThermalEvents = Vec<ThermalEvent, MAX_THERMAL_EVENTS>;

/// Whether the temperature gate applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitoringMode {
    /// Temperature gates arming and motor commands
    Mandatory,
    /// Temperature gate skipped
    Bypassed(BypassCause),
}

/// Noteworthy monitor transitions (channel indices are 0-based)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermalEvent {
    /// Channel dropped after repeated invalid readings
    SensorDisconnected(u8),
    /// Channel dropped because its last valid reading is too old
    SensorStale(u8),
    /// Channel answered a recovery probe
    SensorRecovered(u8),
    BypassEngaged(BypassCause),
    MonitoringRestored(BypassCause),
    AlarmRaised { fused: f32 },
    AlarmCleared { fused: f32 },
}

/// Worst-case temperature used for safety decisions
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FusedTemperature {
    pub value: f32,
    /// `false` when `value` is the fallback constant
    pub live: bool,
}

/// Temperature monitor over up to [`MAX_TEMP_CHANNELS`] probes
pub struct TemperatureMonitor<P> {
    config: ThermalConfig,
    channels: Vec<SensorChannel<P>, MAX_TEMP_CHANNELS>,
    mode: MonitoringMode,
    alarm: bool,
    read_count: u32,
    alarm_count: u32,
    last_reported: [Option<f32>; MAX_TEMP_CHANNELS],
    last_report_ms: u32,
}

impl<P: TemperatureProbe> TemperatureMonitor<P> {
    /// Create a monitor; probes beyond [`MAX_TEMP_CHANNELS`] are ignored
    pub fn new(config: ThermalConfig, probes: impl IntoIterator<Item = P>) -> Self {
        let mut channels = Vec::new();
        for probe in probes.into_iter().take(config.channels as usize) {
            // take() bounds the count to the configured channels
            let _ = channels.push(SensorChannel::new(probe));
        }
        Self {
            config,
            channels,
            mode: MonitoringMode::Mandatory,
            alarm: false,
            read_count: 0,
            alarm_count: 0,
            last_reported: [None; MAX_TEMP_CHANNELS],
            last_report_ms: 0,
        }
    }

    /// Probe every channel at boot
    ///
    /// Returns per-channel connection results. Engages the bypass when no
    /// channel answers and automatic bypass is allowed.
    pub fn init(&mut self, now_ms: u32, events: &mut ThermalEvents) -> [bool; MAX_TEMP_CHANNELS] {
        let mut result = [false; MAX_TEMP_CHANNELS];
        for (i, ch) in self.channels.iter_mut().enumerate() {
            result[i] = ch.connect(now_ms);
        }
        self.check_all_failed(events);
        result
    }

    /// Start a conversion on every connected channel
    pub fn request_readings(&mut self, now_ms: u32, events: &mut ThermalEvents) {
        let mut dropped = false;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            if ch.request(now_ms, &self.config) {
                let _ = events.push(ThermalEvent::SensorDisconnected(i as u8));
                dropped = true;
            }
        }
        if dropped {
            self.check_all_failed(events);
        }
    }

    /// Collect finished conversions
    ///
    /// Returns `true` if any visible channel value changed by more than
    /// the sensitivity.
    pub fn poll_readings(&mut self, now_ms: u32, events: &mut ThermalEvents) -> bool {
        let mut changed = false;
        let mut collected = false;
        let mut dropped = false;

        for (i, ch) in self.channels.iter_mut().enumerate() {
            match ch.collect(now_ms, &self.config) {
                ChannelUpdate::Idle => {}
                ChannelUpdate::Accepted { changed: c } => {
                    collected = true;
                    changed |= c;
                }
                ChannelUpdate::Rejected => collected = true,
                ChannelUpdate::Disconnected => {
                    collected = true;
                    dropped = true;
                    let _ = events.push(ThermalEvent::SensorDisconnected(i as u8));
                }
            }
        }

        if collected {
            self.read_count = self.read_count.wrapping_add(1);
        }
        if dropped {
            self.check_all_failed(events);
        }
        changed
    }

    /// Update the latched alarm from the fused temperature
    ///
    /// Does nothing unless monitoring is required, so a latched alarm
    /// survives the loss of every channel.
    pub fn evaluate_safety(&mut self) -> Option<ThermalEvent> {
        if !self.monitoring_required() {
            return None;
        }
        let fused = self.fused().value;

        if !self.alarm && fused >= self.config.alarm_c {
            self.alarm = true;
            self.alarm_count = self.alarm_count.wrapping_add(1);
            return Some(ThermalEvent::AlarmRaised { fused });
        }
        if self.alarm && fused <= self.config.safe_c {
            self.alarm = false;
            return Some(ThermalEvent::AlarmCleared { fused });
        }
        None
    }

    /// Drop channels whose last valid reading has aged past the timeout
    pub fn check_health(&mut self, now_ms: u32, events: &mut ThermalEvents) {
        let mut dropped = false;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            if ch.check_stale(now_ms, &self.config) {
                let _ = events.push(ThermalEvent::SensorStale(i as u8));
                dropped = true;
            }
        }
        if dropped {
            self.check_all_failed(events);
        }
    }

    /// Re-probe disconnected channels
    ///
    /// A recovered channel lifts a bypass that was engaged because every
    /// channel failed. An operator bypass stays until the operator lifts it.
    pub fn attempt_recovery(&mut self, now_ms: u32, events: &mut ThermalEvents) {
        let mut recovered = false;
        for (i, ch) in self.channels.iter_mut().enumerate() {
            if !ch.is_connected() && ch.connect(now_ms) {
                let _ = events.push(ThermalEvent::SensorRecovered(i as u8));
                recovered = true;
            }
        }
        if recovered && self.mode == MonitoringMode::Bypassed(BypassCause::AllSensorsFailed) {
            self.mode = MonitoringMode::Mandatory;
            let _ = events.push(ThermalEvent::MonitoringRestored(BypassCause::SensorRecovered));
        }
    }

    /// Operator toggle of the bypass
    pub fn set_bypass(&mut self, engaged: bool, events: &mut ThermalEvents) {
        match (engaged, self.mode) {
            (true, MonitoringMode::Bypassed(BypassCause::Operator)) => {}
            (true, _) => {
                self.mode = MonitoringMode::Bypassed(BypassCause::Operator);
                let _ = events.push(ThermalEvent::BypassEngaged(BypassCause::Operator));
            }
            (false, MonitoringMode::Bypassed(_)) => {
                self.mode = MonitoringMode::Mandatory;
                let _ = events.push(ThermalEvent::MonitoringRestored(BypassCause::Operator));
            }
            (false, MonitoringMode::Mandatory) => {}
        }
    }

    /// Maximum over connected channels, or the fallback constant
    pub fn fused(&self) -> FusedTemperature {
        let live = self
            .channels
            .iter()
            .filter_map(|ch| ch.value())
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v))));
        match live {
            Some(value) => FusedTemperature { value, live: true },
            None => FusedTemperature {
                value: self.config.fallback_c,
                live: false,
            },
        }
    }

    /// Check whether a report should go out
    ///
    /// A report is due when a channel moved by the report threshold since
    /// the last report, or when `max_interval_ms` has passed.
    pub fn take_report(&mut self, now_ms: u32, max_interval_ms: u32) -> bool {
        let values = self.values();
        let moved = values.iter().zip(self.last_reported.iter()).any(|(v, r)| match (v, r) {
            (Some(v), Some(r)) => (v - r).abs() >= self.config.report_threshold_c,
            (None, None) => false,
            _ => true,
        });
        let due = moved || now_ms.wrapping_sub(self.last_report_ms) > max_interval_ms;
        if due {
            self.last_reported = values;
            self.last_report_ms = now_ms;
        }
        due
    }

    /// Visible value of every channel slot
    pub fn values(&self) -> [Option<f32>; MAX_TEMP_CHANNELS] {
        let mut out = [None; MAX_TEMP_CHANNELS];
        for (slot, ch) in out.iter_mut().zip(self.channels.iter()) {
            *slot = ch.value();
        }
        out
    }

    /// Connection flag of every channel slot
    pub fn connected(&self) -> [bool; MAX_TEMP_CHANNELS] {
        let mut out = [false; MAX_TEMP_CHANNELS];
        for (slot, ch) in out.iter_mut().zip(self.channels.iter()) {
            *slot = ch.is_connected();
        }
        out
    }

    /// Highest accepted reading of every channel slot
    pub fn peaks(&self) -> [Option<f32>; MAX_TEMP_CHANNELS] {
        let mut out = [None; MAX_TEMP_CHANNELS];
        for (slot, ch) in out.iter_mut().zip(self.channels.iter()) {
            *slot = ch.peak();
        }
        out
    }

    /// Both channels plus the fused value, as reported on the wire
    pub fn temp_pair(&self) -> TempPair {
        let values = self.values();
        TempPair {
            t1: values[0],
            t2: values[1],
            max: self.fused().value,
        }
    }

    pub fn connected_count(&self) -> usize {
        self.channels.iter().filter(|ch| ch.is_connected()).count()
    }

    pub fn mode(&self) -> MonitoringMode {
        self.mode
    }

    /// Temperature gate applies: mode is mandatory and a live value exists
    pub fn monitoring_required(&self) -> bool {
        self.mode == MonitoringMode::Mandatory && self.fused().live
    }

    pub fn is_mandatory(&self) -> bool {
        self.mode == MonitoringMode::Mandatory
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn read_count(&self) -> u32 {
        self.read_count
    }

    pub fn alarm_count(&self) -> u32 {
        self.alarm_count
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.config
    }

    /// Engage the automatic bypass when no channel is left
    fn check_all_failed(&mut self, events: &mut ThermalEvents) {
        if self.connected_count() == 0
            && self.mode == MonitoringMode::Mandatory
            && self.config.allow_auto_bypass
        {
            self.mode = MonitoringMode::Bypassed(BypassCause::AllSensorsFailed);
            let _ = events.push(ThermalEvent::BypassEngaged(BypassCause::AllSensorsFailed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProbe;
    use proptest::prelude::*;

    struct Rig {
        monitor: TemperatureMonitor<ScriptedProbe>,
        probes: [ScriptedProbe; 2],
        events: ThermalEvents,
        now: u32,
    }

    impl Rig {
        fn new(t1: f32, t2: f32) -> Self {
            Self::with_probes(ScriptedProbe::new(&[t1]), ScriptedProbe::new(&[t2]))
        }

        fn with_probes(p1: ScriptedProbe, p2: ScriptedProbe) -> Self {
            let probes = [p1.clone(), p2.clone()];
            let mut monitor = TemperatureMonitor::new(ThermalConfig::default(), [p1, p2]);
            let mut events = ThermalEvents::new();
            monitor.init(0, &mut events);
            Self {
                monitor,
                probes,
                events,
                now: 0,
            }
        }

        /// One 100 ms temperature cadence: collect, evaluate, request
        fn tick(&mut self) -> Option<ThermalEvent> {
            self.now += 100;
            self.monitor.poll_readings(self.now, &mut self.events);
            let event = self.monitor.evaluate_safety();
            self.monitor.request_readings(self.now, &mut self.events);
            event
        }

        fn settle(&mut self) {
            // First pass only requests; the second collects
            self.tick();
            self.tick();
        }
    }

    #[test]
    fn test_fused_is_maximum() {
        let mut rig = Rig::new(30.0, 40.0);
        rig.settle();
        let fused = rig.monitor.fused();
        assert_eq!(fused.value, 40.0);
        assert!(fused.live);
        assert_eq!(rig.monitor.temp_pair().t1, Some(30.0));
    }

    #[test]
    fn test_one_hot_sensor_trips_alarm() {
        let mut rig = Rig::new(25.0, 25.0);
        rig.settle();
        rig.probes[0].hold(60.0);
        rig.probes[1].hold(40.0);
        // Jump of 35 °C needs one confirming reading
        let mut raised = None;
        for _ in 0..3 {
            if let Some(e) = rig.tick() {
                raised = Some(e);
            }
        }
        assert_eq!(raised, Some(ThermalEvent::AlarmRaised { fused: 60.0 }));
        assert!(rig.monitor.alarm());
        assert_eq!(rig.monitor.alarm_count(), 1);
    }

    #[test]
    fn test_alarm_clears_only_when_all_safe() {
        let mut rig = Rig::new(56.0, 40.0);
        rig.settle();
        assert!(rig.monitor.alarm());

        // Between thresholds: alarm holds
        rig.probes[0].hold(52.0);
        rig.tick();
        rig.tick();
        assert!(rig.monitor.alarm());

        // Sensor 1 safe, sensor 2 still between thresholds
        rig.probes[0].hold(45.0);
        rig.probes[1].hold(51.0);
        rig.tick();
        rig.tick();
        assert!(rig.monitor.alarm());

        rig.probes[1].hold(50.0);
        let mut cleared = None;
        for _ in 0..2 {
            if let Some(e) = rig.tick() {
                cleared = Some(e);
            }
        }
        assert_eq!(cleared, Some(ThermalEvent::AlarmCleared { fused: 50.0 }));
        assert!(!rig.monitor.alarm());
    }

    #[test]
    fn test_all_sensors_failed_engages_bypass() {
        let mut rig = Rig::new(25.0, 25.0);
        rig.settle();
        rig.probes[0].hold(-127.0);
        rig.probes[1].hold(-127.0);
        for _ in 0..6 {
            rig.tick();
        }
        assert_eq!(rig.monitor.connected_count(), 0);
        assert_eq!(
            rig.monitor.mode(),
            MonitoringMode::Bypassed(BypassCause::AllSensorsFailed)
        );
        let fused = rig.monitor.fused();
        assert_eq!(fused.value, 25.0);
        assert!(!fused.live);
        assert!(rig.events.contains(&ThermalEvent::SensorDisconnected(0)));
        assert!(rig.events.contains(&ThermalEvent::SensorDisconnected(1)));
        assert!(rig
            .events
            .contains(&ThermalEvent::BypassEngaged(BypassCause::AllSensorsFailed)));
    }

    #[test]
    fn test_auto_bypass_can_be_disabled() {
        let mut config = ThermalConfig::default();
        config.allow_auto_bypass = false;
        let mut monitor = TemperatureMonitor::new(config, [ScriptedProbe::absent()]);
        let mut events = ThermalEvents::new();
        assert_eq!(monitor.init(0, &mut events), [false, false]);
        assert_eq!(monitor.mode(), MonitoringMode::Mandatory);
        assert!(!monitor.monitoring_required());
        assert!(events.is_empty());
    }

    #[test]
    fn test_recovery_restores_mandatory_monitoring() {
        let p1 = ScriptedProbe::absent();
        let p2 = ScriptedProbe::absent();
        let mut rig = Rig::with_probes(p1, p2);
        assert_eq!(
            rig.monitor.mode(),
            MonitoringMode::Bypassed(BypassCause::AllSensorsFailed)
        );

        rig.probes[1].set_present(true);
        rig.probes[1].hold(30.0);
        rig.events.clear();
        rig.monitor.attempt_recovery(10_000, &mut rig.events);

        assert_eq!(rig.monitor.mode(), MonitoringMode::Mandatory);
        assert_eq!(
            rig.events.as_slice(),
            &[
                ThermalEvent::SensorRecovered(1),
                ThermalEvent::MonitoringRestored(BypassCause::SensorRecovered),
            ]
        );
    }

    #[test]
    fn test_operator_bypass_survives_recovery() {
        let mut rig = Rig::with_probes(ScriptedProbe::absent(), ScriptedProbe::absent());
        rig.monitor.set_bypass(true, &mut rig.events);
        assert_eq!(rig.monitor.mode(), MonitoringMode::Bypassed(BypassCause::Operator));

        rig.probes[0].set_present(true);
        rig.monitor.attempt_recovery(10_000, &mut rig.events);
        assert_eq!(rig.monitor.mode(), MonitoringMode::Bypassed(BypassCause::Operator));

        rig.events.clear();
        rig.monitor.set_bypass(false, &mut rig.events);
        assert_eq!(rig.monitor.mode(), MonitoringMode::Mandatory);
        assert_eq!(
            rig.events.as_slice(),
            &[ThermalEvent::MonitoringRestored(BypassCause::Operator)]
        );
    }

    #[test]
    fn test_health_check_catches_silent_sensor() {
        let mut rig = Rig::new(25.0, 25.0);
        rig.settle();
        rig.events.clear();
        rig.monitor.check_health(rig.now + 3500, &mut rig.events);
        assert_eq!(
            rig.events.as_slice(),
            &[
                ThermalEvent::SensorStale(0),
                ThermalEvent::SensorStale(1),
                ThermalEvent::BypassEngaged(BypassCause::AllSensorsFailed),
            ]
        );
    }

    #[test]
    fn test_latched_alarm_survives_channel_loss() {
        let mut rig = Rig::new(58.0, 58.0);
        rig.settle();
        assert!(rig.monitor.alarm());
        rig.monitor.check_health(rig.now + 3500, &mut rig.events);
        assert_eq!(rig.monitor.evaluate_safety(), None);
        assert!(rig.monitor.alarm());
    }

    #[test]
    fn test_report_threshold_and_forced_report() {
        let mut rig = Rig::new(25.0, 25.0);
        rig.settle();
        assert!(rig.monitor.take_report(rig.now, 1000));
        assert!(!rig.monitor.take_report(rig.now + 100, 1000));

        rig.probes[0].hold(25.2);
        rig.tick();
        rig.tick();
        assert!(rig.monitor.take_report(rig.now, 1000));

        let last = rig.now;
        assert!(!rig.monitor.take_report(last + 1000, 1000));
        assert!(rig.monitor.take_report(last + 1001, 1000));
    }

    proptest! {
        #[test]
        fn alarm_hysteresis_holds(readings in prop::collection::vec(20.0f32..70.0, 1..60)) {
            let config = ThermalConfig::default();
            let probe = ScriptedProbe::new(&[]);
            let mut monitor = TemperatureMonitor::new(config, [probe.clone()]);
            let mut events = ThermalEvents::new();
            monitor.init(0, &mut events);

            let mut now = 0;
            for r in readings {
                probe.hold(r);
                monitor.request_readings(now, &mut events);
                now += 100;
                monitor.poll_readings(now, &mut events);
                events.clear();

                let before = monitor.alarm();
                monitor.evaluate_safety();
                let after = monitor.alarm();
                let fused = monitor.fused().value;

                if !before && after {
                    prop_assert!(fused >= config.alarm_c);
                }
                if before && !after {
                    prop_assert!(fused <= config.safe_c);
                }
                if fused > config.safe_c && fused < config.alarm_c {
                    prop_assert_eq!(before, after);
                }
            }
        }
    }
}
