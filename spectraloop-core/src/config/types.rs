//! Configuration type definitions
//!
//! These types hold every tunable of the vehicle. `Default` values are
//! the calibrated constants of the reference vehicle; the firmware may
//! override them from the embedded `vehicle.toml`.

/// Maximum number of ESC channels
pub const MAX_MOTORS: usize = 6;

/// Maximum number of temperature channels
pub const MAX_TEMP_CHANNELS: usize = 2;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Key not valid for its section
    UnknownKey,
    /// Value could not be parsed for its key
    InvalidValue,
    /// Line is neither a header, a comment nor `key = value`
    InvalidLine,
    /// `alarm_c` must be above `safe_c`
    AlarmNotAboveSafe,
    /// Validity window is empty or a margin is negative
    InvalidThermalRange,
    /// More channels than the hardware supports
    TooManyChannels,
    /// Detect/release thresholds give no hysteresis for the polarity
    NoReflectorHysteresis,
    /// A threshold is above the ADC range
    ThresholdOutOfRange,
    /// More motors than the hardware supports
    TooManyMotors,
    /// A group reaches beyond the motor count
    GroupOutOfRange,
    /// ESC pulse range is empty or the dead band swallows it
    InvalidPulseRange,
    /// A period or timeout is zero
    ZeroPeriod,
}

/// Temperature monitoring configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalConfig {
    /// Number of probe channels fitted
    pub channels: u8,
    /// Alarm threshold (°C); alarm latches at or above
    pub alarm_c: f32,
    /// Safe threshold (°C); alarm clears at or below
    pub safe_c: f32,
    /// Warning threshold (°C), reported only
    pub warning_c: f32,
    /// Arming is refused above `alarm_c - arm_margin_c`
    pub arm_margin_c: f32,
    /// Motor commands are refused above `alarm_c - start_margin_c`
    pub start_margin_c: f32,
    /// Exclusive lower bound of a valid reading
    pub valid_min_c: f32,
    /// Exclusive upper bound of a valid reading
    pub valid_max_c: f32,
    /// Value the probe returns when it lost its device
    pub disconnected_sentinel_c: f32,
    /// Minimum change that updates a channel value
    pub sensitivity_c: f32,
    /// Minimum change that triggers a temperature report
    pub report_threshold_c: f32,
    /// Largest believable change between consecutive readings
    pub max_step_c: f32,
    /// Consecutive invalid readings before a channel is dropped
    pub failure_threshold: u8,
    /// A channel without a valid reading for this long is dropped
    pub stale_timeout_ms: u32,
    /// Temperature reported when no channel is connected
    pub fallback_c: f32,
    /// Probe conversion time
    pub conversion_ms: u32,
    /// Engage the bypass automatically when every channel fails
    pub allow_auto_bypass: bool,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            alarm_c: 55.0,
            safe_c: 50.0,
            warning_c: 45.0,
            arm_margin_c: 5.0,
            start_margin_c: 3.0,
            valid_min_c: -50.0,
            valid_max_c: 100.0,
            disconnected_sentinel_c: -127.0,
            sensitivity_c: 0.05,
            report_threshold_c: 0.1,
            max_step_c: 10.0,
            failure_threshold: 5,
            stale_timeout_ms: 3000,
            fallback_c: 25.0,
            conversion_ms: 94,
            allow_auto_bypass: true,
        }
    }
}

/// Which direction the sensor output moves when a reflector is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReflectorPolarity {
    /// Output drops when a reflector passes
    #[default]
    ActiveLow,
    /// Output rises when a reflector passes
    ActiveHigh,
}

/// Reflector counter configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReflectorConfig {
    /// Largest ADC code
    pub adc_max: u16,
    /// Sensor voltage at `adc_max`, in millivolts
    pub full_scale_mv: u32,
    /// Code at which a reflector is considered present
    pub detect_threshold: u16,
    /// Code at which a reflector is considered gone
    pub release_threshold: u16,
    pub polarity: ReflectorPolarity,
    /// Time a new state must persist before it is accepted
    pub stable_ms: u32,
    /// Speeds decay to zero after this long without an edge
    pub speed_timeout_ms: u32,
    /// Readings collected by a calibration run
    pub calibration_samples: u8,
    /// Spacing of calibration readings
    pub calibration_interval_ms: u32,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            adc_max: 4095,
            full_scale_mv: 5000,
            detect_threshold: 3803,
            release_threshold: 4003,
            polarity: ReflectorPolarity::ActiveLow,
            stable_ms: 10,
            speed_timeout_ms: 5000,
            calibration_samples: 10,
            calibration_interval_ms: 50,
        }
    }
}

impl ReflectorConfig {
    /// Convert a raw code to sensor volts
    pub fn code_to_volts(&self, code: u16) -> f32 {
        if self.adc_max == 0 {
            return 0.0;
        }
        (code as f32 * self.full_scale_mv as f32) / (self.adc_max as f32 * 1000.0)
    }
}

/// A contiguous run of motors, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupRange {
    pub first: u8,
    pub count: u8,
}

impl GroupRange {
    /// Index one past the last motor of the group
    pub fn end(&self) -> usize {
        self.first as usize + self.count as usize
    }

    /// Iterate over the motor indices of the group
    pub fn indices(&self) -> core::ops::Range<usize> {
        self.first as usize..self.end()
    }
}

/// Motor bank configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    /// ESC channels fitted
    pub count: u8,
    /// Neutral / stopped pulse
    pub pulse_min_us: u16,
    /// Full throttle pulse
    pub pulse_max_us: u16,
    /// Offset above neutral for the lowest running speed
    pub dead_band_us: u16,
    /// Speed used by `START` without an argument
    pub default_speed: u8,
    pub levitation: GroupRange,
    pub thrust: GroupRange,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            count: 6,
            pulse_min_us: 1000,
            pulse_max_us: 2000,
            dead_band_us: 50,
            default_speed: 50,
            levitation: GroupRange { first: 0, count: 4 },
            thrust: GroupRange { first: 4, count: 2 },
        }
    }
}

/// Task cadences, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    pub temperature_ms: u32,
    pub reflector_ms: u32,
    pub temperature_report_ms: u32,
    /// A temperature report is sent at least this often
    pub temperature_report_max_ms: u32,
    pub reflector_report_ms: u32,
    pub buzzer_ms: u32,
    pub heartbeat_ms: u32,
    pub performance_ms: u32,
    pub health_check_ms: u32,
    pub recovery_ms: u32,
    /// Minimum spacing between two processed commands
    pub command_cooldown_ms: u32,
    /// Read frequency statistics are refreshed at most this often
    pub stats_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            temperature_ms: 100,
            reflector_ms: 5,
            temperature_report_ms: 200,
            temperature_report_max_ms: 1000,
            reflector_report_ms: 500,
            buzzer_ms: 500,
            heartbeat_ms: 5000,
            performance_ms: 10_000,
            health_check_ms: 5000,
            recovery_ms: 10_000,
            command_cooldown_ms: 10,
            stats_ms: 1000,
        }
    }
}

/// Complete vehicle configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VehicleConfig {
    pub thermal: ThermalConfig,
    pub reflector: ReflectorConfig,
    pub motors: MotorConfig,
    pub timing: TimingConfig,
}

impl VehicleConfig {
    /// Check the configuration for inconsistent settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thermal;
        if t.channels as usize > MAX_TEMP_CHANNELS {
            return Err(ConfigError::TooManyChannels);
        }
        if t.alarm_c <= t.safe_c {
            return Err(ConfigError::AlarmNotAboveSafe);
        }
        if t.valid_min_c >= t.valid_max_c
            || t.arm_margin_c < 0.0
            || t.start_margin_c < 0.0
            || t.max_step_c <= 0.0
            || t.failure_threshold == 0
        {
            return Err(ConfigError::InvalidThermalRange);
        }

        let r = &self.reflector;
        if r.detect_threshold > r.adc_max || r.release_threshold > r.adc_max {
            return Err(ConfigError::ThresholdOutOfRange);
        }
        let hysteresis = match r.polarity {
            ReflectorPolarity::ActiveLow => r.detect_threshold < r.release_threshold,
            ReflectorPolarity::ActiveHigh => r.detect_threshold > r.release_threshold,
        };
        if !hysteresis {
            return Err(ConfigError::NoReflectorHysteresis);
        }

        let m = &self.motors;
        if m.count as usize > MAX_MOTORS {
            return Err(ConfigError::TooManyMotors);
        }
        if m.levitation.end() > m.count as usize || m.thrust.end() > m.count as usize {
            return Err(ConfigError::GroupOutOfRange);
        }
        if m.pulse_min_us >= m.pulse_max_us || m.dead_band_us >= m.pulse_max_us - m.pulse_min_us {
            return Err(ConfigError::InvalidPulseRange);
        }

        let p = &self.timing;
        let periods = [
            p.temperature_ms,
            p.reflector_ms,
            p.temperature_report_ms,
            p.temperature_report_max_ms,
            p.reflector_report_ms,
            p.buzzer_ms,
            p.heartbeat_ms,
            p.performance_ms,
            p.health_check_ms,
            p.recovery_ms,
            p.stats_ms,
            t.stale_timeout_ms,
            r.speed_timeout_ms,
            r.calibration_interval_ms,
        ];
        if periods.iter().any(|&p| p == 0) || r.calibration_samples == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        Ok(())
    }
}
