//! Build script for spectraloop-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates vehicle.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths and scripts
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Expected value kind of a config key
#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Int,
    Float,
    Bool,
    Str,
}

const THERMAL_KEYS: &[(&str, Kind)] = &[
    ("channels", Kind::Int),
    ("alarm_c", Kind::Float),
    ("safe_c", Kind::Float),
    ("warning_c", Kind::Float),
    ("arm_margin_c", Kind::Float),
    ("start_margin_c", Kind::Float),
    ("valid_min_c", Kind::Float),
    ("valid_max_c", Kind::Float),
    ("sensitivity_c", Kind::Float),
    ("report_threshold_c", Kind::Float),
    ("max_step_c", Kind::Float),
    ("failure_threshold", Kind::Int),
    ("stale_timeout_ms", Kind::Int),
    ("fallback_c", Kind::Float),
    ("conversion_ms", Kind::Int),
    ("allow_auto_bypass", Kind::Bool),
];

const REFLECTOR_KEYS: &[(&str, Kind)] = &[
    ("adc_max", Kind::Int),
    ("full_scale_mv", Kind::Int),
    ("detect_threshold", Kind::Int),
    ("release_threshold", Kind::Int),
    ("polarity", Kind::Str),
    ("stable_ms", Kind::Int),
    ("speed_timeout_ms", Kind::Int),
    ("calibration_samples", Kind::Int),
    ("calibration_interval_ms", Kind::Int),
];

const MOTOR_KEYS: &[(&str, Kind)] = &[
    ("count", Kind::Int),
    ("pulse_min_us", Kind::Int),
    ("pulse_max_us", Kind::Int),
    ("dead_band_us", Kind::Int),
    ("default_speed", Kind::Int),
    ("levitation", Kind::Str),
    ("thrust", Kind::Str),
];

const TIMING_KEYS: &[(&str, Kind)] = &[
    ("temperature_ms", Kind::Int),
    ("reflector_ms", Kind::Int),
    ("temperature_report_ms", Kind::Int),
    ("temperature_report_max_ms", Kind::Int),
    ("reflector_report_ms", Kind::Int),
    ("buzzer_ms", Kind::Int),
    ("heartbeat_ms", Kind::Int),
    ("performance_ms", Kind::Int),
    ("health_check_ms", Kind::Int),
    ("recovery_ms", Kind::Int),
    ("command_cooldown_ms", Kind::Int),
    ("stats_ms", Kind::Int),
];

const SECTIONS: &[(&str, &[(&str, Kind)])] = &[
    ("thermal", THERMAL_KEYS),
    ("reflector", REFLECTOR_KEYS),
    ("motors", MOTOR_KEYS),
    ("timing", TIMING_KEYS),
];

/// Validate vehicle.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=vehicle.toml");

    let config_path = Path::new("vehicle.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: vehicle.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds vehicle.toml at build time. Please create   ║\n\
            ║  one in the spectraloop-firmware directory.                      ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read vehicle.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => fail("Invalid TOML syntax in vehicle.toml", &[e.to_string()]),
    };

    let mut errors = Vec::new();
    validate_keys(&config, &mut errors);
    if errors.is_empty() {
        validate_thermal(&config, &mut errors);
        validate_reflector(&config, &mut errors);
        validate_motors(&config, &mut errors);
        validate_timing(&config, &mut errors);
    }
    if !errors.is_empty() {
        fail("Invalid vehicle configuration", &errors);
    }

    println!("cargo:warning=vehicle.toml validated successfully");
}

/// Abort the build with a boxed error listing
fn fail(title: &str, errors: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .flat_map(|e| e.lines().map(str::to_string).collect::<Vec<_>>())
            .map(|e| {
                let truncated = if e.len() > 62 {
                    format!("{}...", &e[..59])
                } else {
                    e
                };
                format!("║  • {:<62} ║", truncated)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Reject unknown sections, unknown keys and mistyped values
fn validate_keys(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        errors.push("Top level must be a table".to_string());
        return;
    };

    for (name, section) in root {
        let Some((_, keys)) = SECTIONS.iter().find(|(s, _)| s == name) else {
            errors.push(format!("Unknown section [{}]", name));
            continue;
        };
        let Some(table) = section.as_table() else {
            errors.push(format!("[{}] must be a table", name));
            continue;
        };

        for (key, value) in table {
            let Some((_, kind)) = keys.iter().find(|(k, _)| k == key) else {
                errors.push(format!("[{}] unknown key '{}'", name, key));
                continue;
            };
            let ok = match kind {
                Kind::Int => value.is_integer(),
                // Whole numbers are fine where a float is expected
                Kind::Float => value.is_float() || value.is_integer(),
                Kind::Bool => value.is_bool(),
                Kind::Str => value.is_str(),
            };
            if !ok {
                errors.push(format!("[{}] '{}' has the wrong type", name, key));
            } else if *kind == Kind::Int && value.as_integer().is_some_and(|v| v < 0) {
                errors.push(format!("[{}] '{}' must not be negative", name, key));
            }
        }
    }
}

fn float(config: &toml::Value, section: &str, key: &str) -> Option<f64> {
    let value = config.get(section)?.get(key)?;
    value.as_float().or_else(|| value.as_integer().map(|v| v as f64))
}

fn int(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

fn string<'a>(config: &'a toml::Value, section: &str, key: &str) -> Option<&'a str> {
    config.get(section)?.get(key)?.as_str()
}

fn validate_thermal(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(channels) = int(config, "thermal", "channels") {
        if channels > 2 {
            errors.push("[thermal] channels must be 0-2".to_string());
        }
    }

    let alarm = float(config, "thermal", "alarm_c").unwrap_or(55.0);
    let safe = float(config, "thermal", "safe_c").unwrap_or(50.0);
    if alarm <= safe {
        errors.push("[thermal] alarm_c must be above safe_c".to_string());
    }

    let min = float(config, "thermal", "valid_min_c").unwrap_or(-50.0);
    let max = float(config, "thermal", "valid_max_c").unwrap_or(100.0);
    if min >= max {
        errors.push("[thermal] valid_min_c must be below valid_max_c".to_string());
    }

    if int(config, "thermal", "failure_threshold") == Some(0) {
        errors.push("[thermal] failure_threshold must be at least 1".to_string());
    }
}

fn validate_reflector(config: &toml::Value, errors: &mut Vec<String>) {
    let adc_max = int(config, "reflector", "adc_max").unwrap_or(4095);
    let detect = int(config, "reflector", "detect_threshold").unwrap_or(3803);
    let release = int(config, "reflector", "release_threshold").unwrap_or(4003);

    if detect > adc_max || release > adc_max {
        errors.push("[reflector] thresholds must not exceed adc_max".to_string());
    }

    match string(config, "reflector", "polarity").unwrap_or("active_low") {
        "active_low" if detect >= release => errors
            .push("[reflector] active_low needs detect_threshold < release_threshold".to_string()),
        "active_high" if detect <= release => errors
            .push("[reflector] active_high needs detect_threshold > release_threshold".to_string()),
        "active_low" | "active_high" => {}
        _ => errors.push("[reflector] polarity must be 'active_low' or 'active_high'".to_string()),
    }
}

/// Parse a 1-based `"first-last"` motor range
fn motor_range(range: &str) -> Option<(i64, i64)> {
    let (first, last) = match range.split_once('-') {
        Some((a, b)) => (a.trim().parse().ok()?, b.trim().parse().ok()?),
        None => {
            let n = range.trim().parse().ok()?;
            (n, n)
        }
    };
    (first >= 1 && last >= first).then_some((first, last))
}

fn validate_motors(config: &toml::Value, errors: &mut Vec<String>) {
    let count = int(config, "motors", "count").unwrap_or(6);
    if count > 6 {
        errors.push("[motors] count must be 0-6".to_string());
    }

    let min = int(config, "motors", "pulse_min_us").unwrap_or(1000);
    let max = int(config, "motors", "pulse_max_us").unwrap_or(2000);
    let dead_band = int(config, "motors", "dead_band_us").unwrap_or(50);
    if min >= max || dead_band >= max - min {
        errors.push("[motors] pulse range must leave room above the dead band".to_string());
    }
    if max > 20_000 {
        errors.push("[motors] pulse_max_us must fit in the 20 ms frame".to_string());
    }

    for group in ["levitation", "thrust"] {
        let Some(range) = string(config, "motors", group) else {
            continue;
        };
        match motor_range(range) {
            Some((_, last)) if last <= count => {}
            Some(_) => errors.push(format!("[motors] {} exceeds motor count", group)),
            None => errors.push(format!("[motors] {} must look like \"1-4\"", group)),
        }
    }
}

fn validate_timing(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(timing) = config.get("timing").and_then(|t| t.as_table()) else {
        return;
    };
    for (key, value) in timing {
        if key != "command_cooldown_ms" && value.as_integer() == Some(0) {
            errors.push(format!("[timing] {} must be non-zero", key));
        }
    }
}
