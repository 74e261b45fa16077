use std::string::{String, ToString};
use std::vec::Vec;

use spectraloop_protocol::{Line, Response};

use super::{Controller, Outbox};
use crate::config::VehicleConfig;
use crate::state::InterlockState;
use crate::testing::{MockBoard, MockSwitch, RecordingEsc, ScriptedAdc, ScriptedProbe};
use crate::thermal::MonitoringMode;
use crate::traits::{BoardParts, SensorError};

/// Rendered lines, as the host would see them
#[derive(Default)]
struct Lines(Vec<String>);

impl Outbox for Lines {
    fn send(&mut self, response: Response) {
        self.0.push(response.to_string());
    }
}

impl Lines {
    fn find(&self, prefix: &str) -> Option<&String> {
        self.0.iter().find(|l| l.starts_with(prefix))
    }

    fn has(&self, prefix: &str) -> bool {
        self.find(prefix).is_some()
    }
}

struct Rig {
    controller: Controller<MockBoard>,
    probes: [ScriptedProbe; 2],
    adc: ScriptedAdc,
    escs: Vec<RecordingEsc>,
    relay: MockSwitch,
    buzzer: MockSwitch,
    led: MockSwitch,
    now: u32,
    boot: Lines,
}

impl Rig {
    fn new(t1: f32, t2: f32) -> Self {
        Self::with_probes(ScriptedProbe::new(&[t1]), ScriptedProbe::new(&[t2]))
    }

    fn with_probes(p1: ScriptedProbe, p2: ScriptedProbe) -> Self {
        let probes = [p1.clone(), p2.clone()];
        let adc = ScriptedAdc::new(4095);
        let escs: Vec<RecordingEsc> = (0..6).map(|_| RecordingEsc::default()).collect();
        let relay = MockSwitch::default();
        let buzzer = MockSwitch::default();
        let led = MockSwitch::default();

        let parts = BoardParts::<MockBoard> {
            probes: [p1, p2].into_iter().collect(),
            reflector: adc.clone(),
            escs: escs.iter().cloned().collect(),
            relay: relay.clone(),
            buzzer: buzzer.clone(),
            led: led.clone(),
        };
        let mut controller = Controller::new(VehicleConfig::default(), parts, 0);
        let mut boot = Lines::default();
        controller.boot(0, &mut boot);

        Self {
            controller,
            probes,
            adc,
            escs,
            relay,
            buzzer,
            led,
            now: 0,
            boot,
        }
    }

    /// Send one host line
    fn send(&mut self, line: &str) -> Lines {
        let mut out = Lines::default();
        let line = Line::try_from(line).unwrap();
        self.controller.handle_line(&line, self.now, &mut out);
        out
    }

    /// Advance the clock one millisecond at a time
    fn run(&mut self, ms: u32) -> Lines {
        let mut out = Lines::default();
        for _ in 0..ms {
            self.now += 1;
            self.controller.tick(self.now, &mut out);
        }
        out
    }

    /// Relay on and armed at a cool temperature
    fn armed() -> Self {
        let mut rig = Self::new(30.0, 30.0);
        rig.run(100);
        assert!(rig.send("RELAY_BRAKE_ON").has("RELAY_BRAKE:ON"));
        assert!(rig.send("ARM").has("ARMED"));
        rig
    }
}

#[test]
fn test_boot_announces_sensors_and_reflector() {
    let rig = Rig::with_probes(ScriptedProbe::new(&[25.0]), ScriptedProbe::absent());
    let lines = &rig.boot.0;

    assert!(lines[0].starts_with("SpectraLoop"));
    assert!(rig.boot.has("INIT:Sensor1:CONNECTED"));
    assert!(rig.boot.has("INIT:Sensor2:DISCONNECTED"));
    assert!(rig.boot.has("INIT:Reflector:RAW:4095"));
    assert_eq!(lines.last().map(String::as_str), Some("READY"));

    assert!(!rig.relay.driven());
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
}

#[test]
fn test_boot_without_sensors_engages_bypass() {
    let rig = Rig::with_probes(ScriptedProbe::absent(), ScriptedProbe::absent());
    assert!(rig
        .boot
        .has("WARNING:Temperature_bypass_engaged [CAUSE:ALL_SENSORS_FAILED]"));
    assert!(matches!(
        rig.controller.system_state().monitoring,
        MonitoringMode::Bypassed(_)
    ));
}

#[test]
fn test_every_line_is_acknowledged() {
    let mut rig = Rig::new(30.0, 30.0);
    let out = rig.send("PING");
    assert!(out.0[0].starts_with("ACK:PING "));
    assert!(out.0[1].starts_with("PONG:"));
}

#[test]
fn test_unknown_command() {
    let mut rig = Rig::new(30.0, 30.0);
    let out = rig.send("FOO");
    assert_eq!(out.0.len(), 2);
    assert!(out.0[0].starts_with("ACK:FOO"));
    assert_eq!(out.0[1], "ERROR:Unknown_command:FOO");
}

#[test]
fn test_invalid_motor_number() {
    let mut rig = Rig::armed();
    assert!(rig.send("MOTOR:7:START:50").has("ERROR:Invalid_motor:7"));
    assert!(rig.send("MOTOR:0:STOP").has("ERROR:Invalid_motor:0"));
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
}

#[test]
fn test_motor_start_and_stop_when_armed() {
    let mut rig = Rig::armed();

    let out = rig.send("MOTOR:1:START:50");
    assert!(out.has("MOTOR_STARTED:1:50"));
    assert!(out.has("POST_START"));
    assert!(rig.escs[0].last().unwrap() > 1000);

    let out = rig.send("MOTOR:1:STOP");
    assert!(out.has("MOTOR_STOPPED:1"));
    assert_eq!(rig.escs[0].last(), Some(1000));
}

#[test]
fn test_motor_start_refused_when_disarmed() {
    let mut rig = Rig::new(30.0, 30.0);
    rig.run(100);
    let out = rig.send("MOTOR:1:START:50");
    let refusal = out.find("ERROR:Cannot_start").unwrap();
    assert!(refusal.contains("[REASON:Not_armed]"));
    assert!(rig.escs[0].last() == Some(1000));
}

#[test]
fn test_stop_admitted_with_start_gate_closed() {
    // Disarmed, relay off and the alarm latched
    let mut rig = Rig::new(60.0, 30.0);
    assert!(rig.run(300).has("TEMP_ALARM"));
    rig.send("BRAKE_ON");

    let out = rig.send("MOTOR:1:STOP");
    assert!(out.has("MOTOR_STOPPED:1"));
    assert!(!out.has("ERROR"));

    let out = rig.send("THR_GROUP:STOP");
    assert!(out.has("THR_GROUP_STOPPED"));
    assert!(!out.has("ERROR"));
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
}

#[test]
fn test_group_start_drives_every_member() {
    let mut rig = Rig::armed();
    let out = rig.send("LEV_GROUP:START");
    assert!(out.has("LEV_GROUP_STARTED:50"));
    assert!(out.has("LEV_START"));
    for esc in &rig.escs[..4] {
        assert!(esc.last().unwrap() > 1000);
    }
    for esc in &rig.escs[4..] {
        assert_eq!(esc.last(), Some(1000));
    }
}

#[test]
fn test_hot_sensor_triggers_emergency_stop() {
    let mut rig = Rig::new(60.0, 40.0);
    let out = rig.run(100);

    let stop = out.find("EMERGENCY_STOP:TEMPERATURE").unwrap();
    assert!(stop.contains("Max:60.00C"));
    assert!(out.has("TEMP_ALARM:60.00"));

    let state = rig.controller.system_state();
    assert!(state.temperature_alarm);
    assert_eq!(state.interlock, InterlockState::EmergencyStopped);

    let out = rig.send("MOTOR:1:START:50");
    assert!(out.has("ERROR:Cannot_start"));
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
}

#[test]
fn test_alarm_stops_running_motors() {
    let mut rig = Rig::armed();
    rig.send("LEV_GROUP:START:60");
    assert!(rig.relay.driven());

    // A jump past the plausibility step needs one confirming reading
    rig.probes[0].hold(60.0);
    let out = rig.run(300);

    assert!(out.has("EMERGENCY_STOP:TEMPERATURE"));
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
    assert!(!rig.relay.driven());
    assert!(!rig.controller.system_state().armed);
}

#[test]
fn test_alarm_sounds_buzzer_and_refuses_silence() {
    let mut rig = Rig::new(60.0, 40.0);
    rig.run(1000);
    assert!(rig.buzzer.toggles() > 0);

    let out = rig.send("BUZZER_OFF");
    assert!(out.has("ERROR:Cannot_turn_off_buzzer_during_alarm"));
    assert!(rig.controller.system_state().buzzer_active);

    let out = rig.send("RELAY_BRAKE_ON");
    assert!(out.has("ERROR:Cannot_engage_relay"));
    assert!(!rig.relay.driven());
}

#[test]
fn test_alarm_clears_once_cool() {
    let mut rig = Rig::new(60.0, 40.0);
    rig.run(100);

    rig.probes[0].hold(45.0);
    let out = rig.run(200);
    assert!(out.has("TEMP_SAFE:45.00"));

    let state = rig.controller.system_state();
    assert!(!state.temperature_alarm);
    assert!(!state.buzzer_active);
    assert!(!rig.buzzer.driven());
}

#[test]
fn test_sensor_failure_falls_back_to_bypass() {
    let mut rig = Rig::new(30.0, 30.0);
    rig.run(100);

    rig.probes[0].hold_err(SensorError::Disconnected);
    rig.probes[1].hold_err(SensorError::Disconnected);
    let out = rig.run(600);

    assert!(out.has("WARNING:Sensor1_disconnected"));
    assert!(out.has("WARNING:Sensor2_disconnected"));
    assert!(out.has("WARNING:Temperature_bypass_engaged [CAUSE:ALL_SENSORS_FAILED]"));

    let ack = rig.send("PING");
    assert!(ack.0[0].contains("[MAX:25.00]"));

    assert!(rig.send("RELAY_BRAKE_ON").has("RELAY_BRAKE:ON"));
    assert!(rig.send("ARM").has("ARMED"));
}

#[test]
fn test_operator_bypass_lifted_without_sensors_refuses_motion() {
    let mut rig = Rig::with_probes(ScriptedProbe::absent(), ScriptedProbe::absent());
    let out = rig.send("TEMP_BYPASS_OFF");
    assert!(out.has("INFO:Temperature_monitoring_restored"));

    rig.send("RELAY_BRAKE_ON");
    let out = rig.send("ARM");
    let refusal = out.find("ERROR:Cannot_arm").unwrap();
    assert!(refusal.contains("[REASON:No_temperature_sensors]"));
}

#[test]
fn test_sensor_recovery_restores_monitoring() {
    let probe = ScriptedProbe::absent();
    let mut rig = Rig::with_probes(probe.clone(), ScriptedProbe::absent());
    probe.set_present(true);
    probe.hold(28.0);

    let out = rig.run(10_000);
    assert!(out.has("INFO:Sensor1_recovered"));
    assert!(out.has("INFO:Temperature_monitoring_restored [CAUSE:SENSOR_RECOVERED]"));
    assert_eq!(rig.controller.system_state().monitoring, MonitoringMode::Mandatory);
}

#[test]
fn test_recovered_sensor_waits_for_fresh_reading() {
    let mut rig = Rig::new(56.0, 30.0);
    assert!(rig.run(300).has("TEMP_ALARM:56.00"));

    rig.probes[0].hold_err(SensorError::Disconnected);
    let out = rig.run(1000);
    assert!(out.has("WARNING:Sensor1_disconnected"));
    assert!(out.has("TEMP_SAFE:30.00"));

    // Cool by the time it answers again
    rig.probes[0].hold(30.0);
    let out = rig.run(9000);
    assert!(out.has("INFO:Sensor1_recovered"));
    assert!(!out.has("TEMP_ALARM"));
    assert!(!out.has("EMERGENCY_STOP"));
    assert!(!rig.controller.system_state().temperature_alarm);
}

#[test]
fn test_temperature_margin_blocks_arming() {
    let mut rig = Rig::new(52.0, 30.0);
    rig.run(100);
    rig.send("RELAY_BRAKE_ON");
    let out = rig.send("ARM");
    let refusal = out.find("ERROR:Cannot_arm").unwrap();
    assert!(refusal.contains("[REASON:Temperature_margin]"));
    assert!(refusal.contains("(MaxTemp:52.0C)"));
}

#[test]
fn test_brake_disarms_and_blocks_start() {
    let mut rig = Rig::armed();
    rig.send("MOTOR:2:START:40");

    assert!(rig.send("BRAKE_ON").has("BRAKE_ON"));
    assert_eq!(rig.escs[1].last(), Some(1000));

    assert!(rig.send("MOTOR:2:START:40").has("ERROR:Cannot_start"));
    let out = rig.send("ARM");
    assert!(out.find("ERROR:Cannot_arm").unwrap().contains("[REASON:Brake_active]"));

    rig.send("BRAKE_OFF");
    assert!(rig.send("ARM").has("ARMED"));
}

#[test]
fn test_operator_emergency_stop() {
    let mut rig = Rig::armed();
    rig.send("THR_GROUP:START:30");

    let out = rig.send("EMERGENCY_STOP");
    assert!(out.has("EMERGENCY_STOP [REFLECTOR_FINAL:0]"));
    assert!(rig.escs.iter().all(|e| e.last() == Some(1000)));
    assert!(!rig.relay.driven());
    assert!(rig.controller.system_state().brake_active);
}

#[test]
fn test_stuck_relay_reports_fault() {
    let mut rig = Rig::armed();
    rig.relay.stick(Some(false));

    let out = rig.send("MOTOR:1:START:50");
    assert!(out.has("ERROR:Relay_fault"));
    assert!(out.has("ERROR:Cannot_start"));
    assert!(!rig.controller.system_state().armed);
    assert!(!rig.controller.system_state().relay_brake_active);
}

#[test]
fn test_reflector_counts_single_pass() {
    let mut rig = Rig::new(30.0, 30.0);
    rig.adc.set(3000);
    let out = rig.run(20);
    assert!(out.has("REFLECTOR_DETECTED:1 "));
    assert!(rig.led.driven());

    rig.adc.set(4095);
    let out = rig.run(20);
    assert!(!out.has("REFLECTOR_DETECTED"));
    assert!(!rig.led.driven());

    assert!(rig.send("REFLECTOR_STATUS").has("REFLECTOR_FULL:COUNT:1,"));
}

#[test]
fn test_reflector_reset() {
    let mut rig = Rig::new(30.0, 30.0);
    for _ in 0..3 {
        rig.adc.set(3000);
        rig.run(20);
        rig.adc.set(4095);
        rig.run(20);
    }
    assert!(rig.send("REFLECTOR_STATUS").has("REFLECTOR_FULL:COUNT:3,"));

    assert!(rig.send("REFLECTOR_RESET").has("REFLECTOR_RESET:SUCCESS"));
    let out = rig.send("REFLECTOR_STATUS");
    let full = out.find("REFLECTOR_FULL").unwrap();
    assert!(full.starts_with("REFLECTOR_FULL:COUNT:0,"));
    assert!(full.contains("AVG_SPEED:0.00"));
}

#[test]
fn test_calibration_runs_without_blocking() {
    let mut rig = Rig::new(30.0, 30.0);
    rig.adc.set(2000);

    let out = rig.send("REFLECTOR_CALIBRATE");
    assert!(out.has("REFLECTOR_CALIBRATION:STARTED [SAMPLES:10] [INTERVAL:50ms]"));

    // Commands keep being served while the run is in progress
    rig.run(100);
    assert!(rig.send("PING").has("PONG"));

    let out = rig.run(500);
    let result = out.find("REFLECTOR_CALIBRATION:MIN:").unwrap();
    assert!(result.starts_with("REFLECTOR_CALIBRATION:MIN:2000,MAX:2000,AVG:2000"));
}

#[test]
fn test_periodic_reports() {
    let mut rig = Rig::new(30.0, 31.0);
    let out = rig.run(10_000);

    assert!(out.has("DUAL_TEMP [TEMP1:30.00] [TEMP2:31.00] [MAX:31.00]"));
    assert!(out.has("REFLECTOR_STATUS [COUNT:0]"));
    assert!(out.has("HEARTBEAT:5,0,0,0,31.00,0,0"));
    assert!(out.has("PERFORMANCE:1000.0Hz"));
}

#[test]
fn test_temperature_report_suppressed_while_steady() {
    let mut rig = Rig::new(30.0, 30.0);
    assert!(rig.run(200).has("DUAL_TEMP"));
    assert!(!rig.run(800).has("DUAL_TEMP"));

    rig.probes[1].hold(32.0);
    let out = rig.run(200);
    assert!(out.has("DUAL_TEMP [TEMP1:30.00] [TEMP2:32.00]"));
}

#[test]
fn test_status_block() {
    let mut rig = Rig::armed();
    rig.send("MOTOR:5:START:70");
    let out = rig.send("STATUS");
    let status = out.find("STATUS_START").unwrap();
    assert!(status.contains("Armed:1"));
    assert!(status.contains("RelayBrake:1"));
    assert!(status.contains("Motors:0,0,0,0,1,0"));
    assert!(status.contains("IndividualSpeeds:0,0,0,0,70,0"));
    assert!(status.ends_with("STATUS_END"));
}

#[test]
fn test_command_cooldown() {
    let mut rig = Rig::new(30.0, 30.0);
    assert!(rig.controller.accepts_command(0));

    rig.now = 100;
    rig.send("PING");
    assert!(!rig.controller.accepts_command(105));
    assert!(!rig.controller.accepts_command(110));
    assert!(rig.controller.accepts_command(111));
}

#[test]
fn test_dropped_lines_reported() {
    let mut rig = Rig::new(30.0, 30.0);
    rig.controller.set_dropped_lines(3);
    let out = rig.run(10_000);
    assert!(out.find("PERFORMANCE").unwrap().ends_with("DroppedLines:3"));
}
