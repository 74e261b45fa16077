//! Outbound lines
//!
//! Every line the vehicle sends is a [`Response`] variant. Rendering is
//! done through `Display` so the firmware can format straight into a
//! fixed-capacity buffer. Multi-line responses (`STATUS_START` ..
//! `STATUS_END`, alarm pairs, heartbeats) are separated by `\n`; the
//! transport appends the final terminator.
//!
//! Booleans render as `0`/`1`, temperatures with two decimals, and a
//! disconnected channel as `N/A`.

use core::fmt::{self, Display, Formatter};

use heapless::Vec;

use crate::command::Group;
use crate::line::Line;

/// Identifier returned by `PING`
pub const FIRMWARE_TAG: &str = concat!("SPECTRALOOP-RS-", env!("CARGO_PKG_VERSION"));

/// Maximum number of motors carried in a status report
pub const MAX_REPORTED_MOTORS: usize = 6;

/// Both channel readings plus the fused (worst-case) value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempPair {
    /// Channel 1, `None` when disconnected
    pub t1: Option<f32>,
    /// Channel 2, `None` when disconnected or absent
    pub t2: Option<f32>,
    /// Fused temperature used for safety decisions
    pub max: f32,
}

/// Reflector counter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReflectorReport {
    pub count: u64,
    pub voltage: f32,
    pub detected: bool,
    pub avg_rpm: f32,
    pub inst_rpm: f32,
    pub detections: u64,
    pub reads: u64,
    pub read_freq_hz: f32,
    pub active: bool,
}

/// Temperature subsystem snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalReport {
    pub temps: TempPair,
    pub alarm: bool,
    pub buzzer: bool,
    pub connected: [bool; 2],
    /// Fault-tolerant bypass engaged (temperature gate skipped)
    pub bypassed: bool,
    pub read_count: u32,
    pub alarm_count: u32,
    pub read_freq_hz: f32,
    /// Per-channel maximum observed temperature
    pub peak: [Option<f32>; 2],
    pub reflector: ReflectorReport,
}

/// One motor in a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorSnapshot {
    pub running: bool,
    pub speed: u8,
}

/// Full `STATUS_START` .. `STATUS_END` block
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusReport {
    pub armed: bool,
    pub brake: bool,
    pub relay: bool,
    pub thermal: ThermalReport,
    pub lev_speed: u8,
    pub thr_speed: u8,
    pub motors: Vec<MotorSnapshot, MAX_REPORTED_MOTORS>,
}

/// Periodic heartbeat (`HEARTBEAT:` + `HB_DUAL`)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatReport {
    pub uptime_s: u32,
    pub armed: bool,
    pub brake: bool,
    pub relay: bool,
    pub temps: TempPair,
    pub alarm: bool,
    pub active_motors: u8,
    pub reflector_count: u64,
    pub reflector_avg_rpm: f32,
}

/// Periodic performance report
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PerformanceReport {
    pub loop_hz: f32,
    pub temp_read_hz: f32,
    pub connected: [bool; 2],
    pub reflector_read_hz: f32,
    pub reflector_count: u64,
    pub dropped_lines: u32,
}

/// Result of a reflector calibration run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationReport {
    pub min: u16,
    pub max: u16,
    pub avg: u16,
    pub min_v: f32,
    pub max_v: f32,
    pub avg_v: f32,
    pub detect_threshold: u16,
    pub release_threshold: u16,
}

/// Why an emergency stop happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopCause {
    /// `EMERGENCY_STOP` command
    Operator,
    /// Temperature alarm tripped the interlock
    Temperature,
}

/// Why the temperature gate changed mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BypassCause {
    /// Every channel failed
    AllSensorsFailed,
    /// A channel came back after an automatic bypass
    SensorRecovered,
    /// `TEMP_BYPASS_ON` / `TEMP_BYPASS_OFF`
    Operator,
}

impl BypassCause {
    fn token(&self) -> &'static str {
        match self {
            BypassCause::AllSensorsFailed => "ALL_SENSORS_FAILED",
            BypassCause::SensorRecovered => "SENSOR_RECOVERED",
            BypassCause::Operator => "OPERATOR",
        }
    }
}

/// Channel health notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorNotice {
    /// Too many consecutive invalid readings
    Disconnected,
    /// No valid reading within the staleness timeout
    Stale,
    /// Recovery probe succeeded
    Recovered,
}

/// Which command a precondition rejection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Refusal {
    Arm,
    Start,
    RelayBrake,
}

impl Refusal {
    fn token(&self) -> &'static str {
        match self {
            Refusal::Arm => "Cannot_arm",
            Refusal::Start => "Cannot_start",
            Refusal::RelayBrake => "Cannot_engage_relay",
        }
    }
}

/// A single outbound message
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Acknowledgement echoing the received line
    Ack {
        command: Line,
        temps: TempPair,
        reflector: u64,
    },
    Pong,
    /// Malformed or unknown command
    Malformed {
        reason: &'static str,
        command: Line,
    },
    /// Precondition not met
    Refused {
        action: Refusal,
        reason: &'static str,
        max_temp: f32,
        reflector: u64,
    },
    /// Motor number outside the bank
    InvalidMotor(u8),
    /// Plain `ERROR:<reason>`
    Error(&'static str),
    Armed {
        reflector: u64,
    },
    Disarmed {
        reflector: u64,
    },
    Brake {
        engaged: bool,
        reflector: u64,
    },
    RelayBrake {
        engaged: bool,
        reflector: u64,
    },
    EmergencyStop {
        cause: StopCause,
        temps: TempPair,
        reflector: u64,
    },
    MotorStarted {
        motor: u8,
        speed: u8,
        reflector: u64,
    },
    MotorStopped {
        motor: u8,
        reflector: u64,
    },
    MotorSpeed {
        motor: u8,
        speed: u8,
        reflector: u64,
    },
    GroupStarted {
        group: Group,
        speed: u8,
        reflector: u64,
    },
    GroupStopped {
        group: Group,
        reflector: u64,
    },
    GroupSpeed {
        group: Group,
        speed: u8,
        reflector: u64,
    },
    /// Temperature snapshot after a start (`POST_START`, `LEV_START`, `THR_START`)
    PostStart {
        group: Option<Group>,
        temps: TempPair,
        reflector: u64,
    },
    TemperatureAlarm {
        temps: TempPair,
        reflector: u64,
    },
    TemperatureSafe {
        temps: TempPair,
        reflector: u64,
    },
    Sensor {
        /// 1-based channel number
        sensor: u8,
        notice: SensorNotice,
    },
    BypassEngaged(BypassCause),
    MonitoringRestored(BypassCause),
    RelayReasserted,
    /// Relay readback stayed off after re-assertion; the vehicle was disarmed
    RelayFault {
        reflector: u64,
    },
    DualTemp(TempPair),
    TempDual(ThermalReport),
    TempStatus(ThermalReport),
    TempRealtime(ThermalReport),
    Status(StatusReport),
    ReflectorDetected {
        count: u64,
        voltage: f32,
        speed_rpm: f32,
    },
    ReflectorStatus(ReflectorReport),
    ReflectorFull(ReflectorReport),
    ReflectorReset,
    ReflectorCalibrationStarted {
        samples: u8,
        interval_ms: u32,
    },
    ReflectorCalibration(CalibrationReport),
    BuzzerOff,
    Heartbeat(HeartbeatReport),
    Performance(PerformanceReport),
    Banner,
    SensorProbe {
        sensor: u8,
        connected: bool,
    },
    ReflectorBaseline {
        raw: u16,
        voltage: f32,
        detect_v: f32,
        release_v: f32,
    },
    Ready,
}

/// Renders an optional temperature as `xx.xx` or `N/A`
struct Celsius(Option<f32>);

impl Display for Celsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.2}", v),
            None => f.write_str("N/A"),
        }
    }
}

fn flag(b: bool) -> u8 {
    b as u8
}

fn yn(b: bool) -> char {
    if b {
        'Y'
    } else {
        'N'
    }
}

fn on_off(b: bool) -> &'static str {
    if b {
        "ON"
    } else {
        "OFF"
    }
}

impl Display for TempPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TEMP1:{}] [TEMP2:{}] [MAX:{:.2}]",
            Celsius(self.t1),
            Celsius(self.t2),
            self.max
        )
    }
}

impl TempPair {
    /// `(S1:..,S2:..)` fragment used by alarm lines
    fn channels(&self) -> impl Display + '_ {
        struct Channels<'a>(&'a TempPair);
        impl Display for Channels<'_> {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "(S1:{},S2:{})", Celsius(self.0.t1), Celsius(self.0.t2))
            }
        }
        Channels(self)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack {
                command,
                temps,
                reflector,
            } => write!(f, "ACK:{} {} [REFLECTOR:{}]", command, temps, reflector),
            Response::Pong => write!(f, "PONG:{}", FIRMWARE_TAG),
            Response::Malformed { reason, command } => write!(f, "ERROR:{}:{}", reason, command),
            Response::Refused {
                action,
                reason,
                max_temp,
                reflector,
            } => write!(
                f,
                "ERROR:{} (MaxTemp:{:.1}C) [REASON:{}] [REFLECTOR:{}]",
                action.token(),
                max_temp,
                reason,
                reflector
            ),
            Response::InvalidMotor(n) => write!(f, "ERROR:Invalid_motor:{}", n),
            Response::Error(reason) => write!(f, "ERROR:{}", reason),
            Response::Armed { reflector } => write!(f, "ARMED [REFLECTOR:{}]", reflector),
            Response::Disarmed { reflector } => write!(f, "DISARMED [REFLECTOR:{}]", reflector),
            Response::Brake { engaged, reflector } => write!(
                f,
                "{} [REFLECTOR:{}]",
                if *engaged { "BRAKE_ON" } else { "BRAKE_OFF" },
                reflector
            ),
            Response::RelayBrake { engaged, reflector } => {
                write!(f, "RELAY_BRAKE:{} [REFLECTOR:{}]", on_off(*engaged), reflector)
            }
            Response::EmergencyStop {
                cause: StopCause::Operator,
                reflector,
                ..
            } => write!(f, "EMERGENCY_STOP [REFLECTOR_FINAL:{}]", reflector),
            Response::EmergencyStop {
                cause: StopCause::Temperature,
                temps,
                reflector,
            } => write!(
                f,
                "EMERGENCY_STOP:TEMPERATURE - Max:{:.2}C {} [REFLECTOR_FINAL:{}]",
                temps.max,
                temps.channels(),
                reflector
            ),
            Response::MotorStarted {
                motor,
                speed,
                reflector,
            } => write!(f, "MOTOR_STARTED:{}:{} [REFLECTOR:{}]", motor, speed, reflector),
            Response::MotorStopped { motor, reflector } => {
                write!(f, "MOTOR_STOPPED:{} [REFLECTOR:{}]", motor, reflector)
            }
            Response::MotorSpeed {
                motor,
                speed,
                reflector,
            } => write!(f, "MOTOR_SPEED:{}:{} [REFLECTOR:{}]", motor, speed, reflector),
            Response::GroupStarted {
                group,
                speed,
                reflector,
            } => write!(
                f,
                "{}_GROUP_STARTED:{} [REFLECTOR:{}]",
                group.prefix(),
                speed,
                reflector
            ),
            Response::GroupStopped { group, reflector } => write!(
                f,
                "{}_GROUP_STOPPED [REFLECTOR:{}]",
                group.prefix(),
                reflector
            ),
            Response::GroupSpeed {
                group,
                speed,
                reflector,
            } => write!(
                f,
                "{}_GROUP_SPEED:{} [REFLECTOR:{}]",
                group.prefix(),
                speed,
                reflector
            ),
            Response::PostStart {
                group,
                temps,
                reflector,
            } => {
                match group {
                    Some(g) => write!(f, "{}_START", g.prefix())?,
                    None => f.write_str("POST_START")?,
                }
                write!(
                    f,
                    " [TEMP1:{}] [TEMP2:{}] [REFLECTOR:{}]",
                    Celsius(temps.t1),
                    Celsius(temps.t2),
                    reflector
                )
            }
            Response::TemperatureAlarm { temps, reflector } => write!(
                f,
                "TEMP_ALARM:{:.2} {} [REFLECTOR:{}]\nALARM_ACTIVE [TEMP:{:.2}] [REFLECTOR:{}]",
                temps.max,
                temps.channels(),
                reflector,
                temps.max,
                reflector
            ),
            Response::TemperatureSafe { temps, reflector } => write!(
                f,
                "TEMP_SAFE:{:.2} {} [REFLECTOR:{}]\nTEMP_NORMAL [TEMP:{:.2}] [REFLECTOR:{}]",
                temps.max,
                temps.channels(),
                reflector,
                temps.max,
                reflector
            ),
            Response::Sensor { sensor, notice } => match notice {
                SensorNotice::Disconnected => write!(f, "WARNING:Sensor{}_disconnected", sensor),
                SensorNotice::Stale => write!(f, "WARNING:Sensor{}_stale", sensor),
                SensorNotice::Recovered => write!(f, "INFO:Sensor{}_recovered", sensor),
            },
            Response::BypassEngaged(cause) => write!(
                f,
                "WARNING:Temperature_bypass_engaged [CAUSE:{}]",
                cause.token()
            ),
            Response::MonitoringRestored(cause) => write!(
                f,
                "INFO:Temperature_monitoring_restored [CAUSE:{}]",
                cause.token()
            ),
            Response::RelayReasserted => f.write_str("WARNING:Relay_reasserted"),
            Response::RelayFault { reflector } => {
                write!(f, "ERROR:Relay_fault [REFLECTOR:{}]", reflector)
            }
            Response::DualTemp(temps) => write!(f, "DUAL_TEMP {}", temps),
            Response::TempDual(r) => write!(
                f,
                "TEMP_DUAL:S1:{},S2:{},MAX:{:.2},ALARM:{},S1_CONN:{},S2_CONN:{},BYPASS:{}",
                Celsius(r.temps.t1),
                Celsius(r.temps.t2),
                r.temps.max,
                flag(r.alarm),
                flag(r.connected[0]),
                flag(r.connected[1]),
                flag(r.bypassed)
            ),
            Response::TempStatus(r) => {
                write_thermal_lines(f, r)?;
                write!(
                    f,
                    "\nReadCount:{}\nAlarmCount:{}\nReadFrequency:{:.1}Hz\nReflectorCount:{}\nReflectorSpeed:{:.1}rpm",
                    r.read_count, r.alarm_count, r.read_freq_hz, r.reflector.count, r.reflector.avg_rpm
                )
            }
            Response::TempRealtime(r) => write!(
                f,
                "REALTIME_DUAL:{},{},{:.2},{},{},{},{},{:.1},{:.1}",
                Celsius(r.temps.t1),
                Celsius(r.temps.t2),
                r.temps.max,
                flag(r.alarm),
                flag(r.buzzer),
                r.read_count,
                r.reflector.count,
                r.reflector.avg_rpm,
                r.reflector.inst_rpm
            ),
            Response::Status(s) => write_status(f, s),
            Response::ReflectorDetected {
                count,
                voltage,
                speed_rpm,
            } => write!(
                f,
                "REFLECTOR_DETECTED:{} [VOLTAGE:{:.2}V] [SPEED:{:.1}rpm]",
                count, voltage, speed_rpm
            ),
            Response::ReflectorStatus(r) => write!(
                f,
                "REFLECTOR_STATUS [COUNT:{}] [VOLTAGE:{:.2}V] [STATE:{}] [AVG_SPEED:{:.1}rpm] [INST_SPEED:{:.1}rpm] [READ_FREQ:{:.1}Hz]",
                r.count,
                r.voltage,
                if r.detected { "DETECTED" } else { "CLEAR" },
                r.avg_rpm,
                r.inst_rpm,
                r.read_freq_hz
            ),
            Response::ReflectorFull(r) => write!(
                f,
                "REFLECTOR_FULL:COUNT:{},VOLTAGE:{:.3},STATE:{},AVG_SPEED:{:.2},INST_SPEED:{:.2},DETECTIONS:{},READS:{},READ_FREQ:{:.1},ACTIVE:{}",
                r.count,
                r.voltage,
                flag(r.detected),
                r.avg_rpm,
                r.inst_rpm,
                r.detections,
                r.reads,
                r.read_freq_hz,
                flag(r.active)
            ),
            Response::ReflectorReset => f.write_str("REFLECTOR_RESET:SUCCESS"),
            Response::ReflectorCalibrationStarted {
                samples,
                interval_ms,
            } => write!(
                f,
                "REFLECTOR_CALIBRATION:STARTED [SAMPLES:{}] [INTERVAL:{}ms]",
                samples, interval_ms
            ),
            Response::ReflectorCalibration(c) => write!(
                f,
                "REFLECTOR_CALIBRATION:MIN:{},MAX:{},AVG:{},MIN_V:{:.2},MAX_V:{:.2},AVG_V:{:.2},DETECT_TH:{},RELEASE_TH:{}",
                c.min, c.max, c.avg, c.min_v, c.max_v, c.avg_v, c.detect_threshold, c.release_threshold
            ),
            Response::BuzzerOff => f.write_str("BUZZER_OFF"),
            Response::Heartbeat(h) => write!(
                f,
                "HEARTBEAT:{},{},{},{},{:.2},{},{}\nHB_DUAL {} [REFLECTOR:{}] [REF_SPEED:{:.1}]",
                h.uptime_s,
                flag(h.armed),
                flag(h.brake),
                flag(h.relay),
                h.temps.max,
                flag(h.alarm),
                h.active_motors,
                h.temps,
                h.reflector_count,
                h.reflector_avg_rpm
            ),
            Response::Performance(p) => write!(
                f,
                "PERFORMANCE:{:.1}Hz,TempReads:{:.1}Hz,DualSensors:{}{},ReflectorReads:{:.1}Hz,ReflectorCount:{},DroppedLines:{}",
                p.loop_hz,
                p.temp_read_hz,
                yn(p.connected[0]),
                yn(p.connected[1]),
                p.reflector_read_hz,
                p.reflector_count,
                p.dropped_lines
            ),
            Response::Banner => write!(
                f,
                "SpectraLoop {} DUAL TEMPERATURE + REFLECTOR COUNTER",
                FIRMWARE_TAG
            ),
            Response::SensorProbe { sensor, connected } => write!(
                f,
                "INIT:Sensor{}:{}",
                sensor,
                if *connected { "CONNECTED" } else { "DISCONNECTED" }
            ),
            Response::ReflectorBaseline {
                raw,
                voltage,
                detect_v,
                release_v,
            } => write!(
                f,
                "INIT:Reflector:RAW:{},VOLTAGE:{:.2}V,DETECT_TH:{:.2}V,RELEASE_TH:{:.2}V",
                raw, voltage, detect_v, release_v
            ),
            Response::Ready => f.write_str("READY"),
        }
    }
}

/// Temperature lines shared by `TEMP_STATUS` and the status block
fn write_thermal_lines(f: &mut Formatter<'_>, r: &ThermalReport) -> fmt::Result {
    write!(
        f,
        "Temperature1:{}\nTemperature2:{}\nTemperatureMax:{:.2}\nTempAlarm:{}\nBuzzerActive:{}\nSensor1Connected:{}\nSensor2Connected:{}\nTempMonitoring:{}",
        Celsius(r.temps.t1),
        Celsius(r.temps.t2),
        r.temps.max,
        flag(r.alarm),
        flag(r.buzzer),
        flag(r.connected[0]),
        flag(r.connected[1]),
        if r.bypassed { "BYPASSED" } else { "MANDATORY" }
    )
}

fn write_status(f: &mut Formatter<'_>, s: &StatusReport) -> fmt::Result {
    write!(
        f,
        "STATUS_START\nArmed:{}\nBrake:{}\nRelayBrake:{}\n",
        flag(s.armed),
        flag(s.brake),
        flag(s.relay)
    )?;
    write_thermal_lines(f, &s.thermal)?;

    let r = &s.thermal.reflector;
    write!(
        f,
        "\nLevGroupSpeed:{}\nThrGroupSpeed:{}\nReflectorCount:{}\nReflectorVoltage:{:.2}\nReflectorState:{}\nReflectorAvgSpeed:{:.1}\nReflectorInstSpeed:{:.1}\nReflectorActive:{}\nMotors:",
        s.lev_speed,
        s.thr_speed,
        r.count,
        r.voltage,
        flag(r.detected),
        r.avg_rpm,
        r.inst_rpm,
        flag(r.active)
    )?;

    for (i, m) in s.motors.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", flag(m.running))?;
    }
    f.write_str("\nIndividualSpeeds:")?;
    for (i, m) in s.motors.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", m.speed)?;
    }
    f.write_str("\nSTATUS_END")
}
