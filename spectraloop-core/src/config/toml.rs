//! Simple TOML parser for the vehicle configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! `vehicle.toml`. It does NOT support the full TOML grammar and needs no
//! allocator.
//!
//! Supported features:
//! - `[section]` headers
//! - `key = value` pairs (string, integer, float, boolean)
//! - Comments (`# ...`), including trailing comments
//!
//! Keys missing from the file keep their defaults. Unknown sections and
//! keys are errors so a typo never silently falls back to a default.

use super::types::{
    ConfigError, GroupRange, MotorConfig, ReflectorConfig, ReflectorPolarity, ThermalConfig,
    TimingConfig, VehicleConfig,
};

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Thermal,
    Reflector,
    Motors,
    Timing,
}

/// Parse TOML text into a validated `VehicleConfig`
pub fn parse_config(input: &str) -> Result<VehicleConfig, ConfigError> {
    let mut config = VehicleConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(ConfigError::InvalidSection);
            }
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ConfigError::InvalidLine)?;
        match section {
            Section::Root => return Err(ConfigError::UnknownKey),
            Section::Thermal => apply_thermal(&mut config.thermal, key, value)?,
            Section::Reflector => apply_reflector(&mut config.reflector, key, value)?,
            Section::Motors => apply_motors(&mut config.motors, key, value)?,
            Section::Timing => apply_timing(&mut config.timing, key, value)?,
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "thermal" => Ok(Section::Thermal),
        "reflector" => Ok(Section::Reflector),
        "motors" => Ok(Section::Motors),
        "timing" => Ok(Section::Timing),
        _ => Err(ConfigError::InvalidSection),
    }
}

/// Remove a trailing `# comment` that is not inside a string
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> Result<&str, ConfigError> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Ok(&value[1..value.len() - 1])
    } else {
        Err(ConfigError::InvalidValue)
    }
}

/// Parse an integer value, allowing `_` digit separators
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ConfigError> {
    let mut digits: heapless::String<24> = heapless::String::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ConfigError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ConfigError::InvalidValue)
}

/// Parse a float value; integers are accepted too
fn parse_float(value: &str) -> Result<f32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

fn parse_polarity(value: &str) -> Result<ReflectorPolarity, ConfigError> {
    match parse_string(value)? {
        "active_low" => Ok(ReflectorPolarity::ActiveLow),
        "active_high" => Ok(ReflectorPolarity::ActiveHigh),
        _ => Err(ConfigError::InvalidValue),
    }
}

/// Parse a 1-based inclusive motor range like `"1-4"` or `"5"`
fn parse_group(value: &str) -> Result<GroupRange, ConfigError> {
    let value = parse_string(value)?;
    let (first, last) = match value.split_once('-') {
        Some((a, b)) => (parse_int::<u8>(a.trim())?, parse_int::<u8>(b.trim())?),
        None => {
            let n = parse_int::<u8>(value.trim())?;
            (n, n)
        }
    };
    if first == 0 || last < first {
        return Err(ConfigError::InvalidValue);
    }
    Ok(GroupRange {
        first: first - 1,
        count: last - first + 1,
    })
}

fn apply_thermal(t: &mut ThermalConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "channels" => t.channels = parse_int(value)?,
        "alarm_c" => t.alarm_c = parse_float(value)?,
        "safe_c" => t.safe_c = parse_float(value)?,
        "warning_c" => t.warning_c = parse_float(value)?,
        "arm_margin_c" => t.arm_margin_c = parse_float(value)?,
        "start_margin_c" => t.start_margin_c = parse_float(value)?,
        "valid_min_c" => t.valid_min_c = parse_float(value)?,
        "valid_max_c" => t.valid_max_c = parse_float(value)?,
        "sensitivity_c" => t.sensitivity_c = parse_float(value)?,
        "report_threshold_c" => t.report_threshold_c = parse_float(value)?,
        "max_step_c" => t.max_step_c = parse_float(value)?,
        "failure_threshold" => t.failure_threshold = parse_int(value)?,
        "stale_timeout_ms" => t.stale_timeout_ms = parse_int(value)?,
        "fallback_c" => t.fallback_c = parse_float(value)?,
        "conversion_ms" => t.conversion_ms = parse_int(value)?,
        "allow_auto_bypass" => t.allow_auto_bypass = parse_bool(value)?,
        _ => return Err(ConfigError::UnknownKey),
    }
    Ok(())
}

fn apply_reflector(r: &mut ReflectorConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "adc_max" => r.adc_max = parse_int(value)?,
        "full_scale_mv" => r.full_scale_mv = parse_int(value)?,
        "detect_threshold" => r.detect_threshold = parse_int(value)?,
        "release_threshold" => r.release_threshold = parse_int(value)?,
        "polarity" => r.polarity = parse_polarity(value)?,
        "stable_ms" => r.stable_ms = parse_int(value)?,
        "speed_timeout_ms" => r.speed_timeout_ms = parse_int(value)?,
        "calibration_samples" => r.calibration_samples = parse_int(value)?,
        "calibration_interval_ms" => r.calibration_interval_ms = parse_int(value)?,
        _ => return Err(ConfigError::UnknownKey),
    }
    Ok(())
}

fn apply_motors(m: &mut MotorConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "count" => m.count = parse_int(value)?,
        "pulse_min_us" => m.pulse_min_us = parse_int(value)?,
        "pulse_max_us" => m.pulse_max_us = parse_int(value)?,
        "dead_band_us" => m.dead_band_us = parse_int(value)?,
        "default_speed" => m.default_speed = parse_int::<u8>(value)?.min(100),
        "levitation" => m.levitation = parse_group(value)?,
        "thrust" => m.thrust = parse_group(value)?,
        _ => return Err(ConfigError::UnknownKey),
    }
    Ok(())
}

fn apply_timing(p: &mut TimingConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let slot = match key {
        "temperature_ms" => &mut p.temperature_ms,
        "reflector_ms" => &mut p.reflector_ms,
        "temperature_report_ms" => &mut p.temperature_report_ms,
        "temperature_report_max_ms" => &mut p.temperature_report_max_ms,
        "reflector_report_ms" => &mut p.reflector_report_ms,
        "buzzer_ms" => &mut p.buzzer_ms,
        "heartbeat_ms" => &mut p.heartbeat_ms,
        "performance_ms" => &mut p.performance_ms,
        "health_check_ms" => &mut p.health_check_ms,
        "recovery_ms" => &mut p.recovery_ms,
        "command_cooldown_ms" => &mut p.command_cooldown_ms,
        "stats_ms" => &mut p.stats_ms,
        _ => return Err(ConfigError::UnknownKey),
    };
    *slot = parse_int(value)?;
    Ok(())
}
