//! Non-blocking reflector calibration run

use spectraloop_protocol::CalibrationReport;

use crate::config::ReflectorConfig;

/// Accumulates spaced raw readings until the run is complete
#[derive(Debug, Clone)]
pub struct Calibration {
    target: u8,
    interval_ms: u32,
    taken: u8,
    last_ms: Option<u32>,
    min: u16,
    max: u16,
    sum: u32,
}

impl Calibration {
    pub fn new(target: u8, interval_ms: u32) -> Self {
        Self {
            target: target.max(1),
            interval_ms,
            taken: 0,
            last_ms: None,
            min: u16::MAX,
            max: 0,
            sum: 0,
        }
    }

    /// Offer a reading; it is kept once per interval
    ///
    /// Returns `true` when enough readings have been kept.
    pub fn offer(&mut self, now_ms: u32, raw: u16) -> bool {
        let due = self
            .last_ms
            .map_or(true, |last| now_ms.wrapping_sub(last) >= self.interval_ms);
        if due && self.taken < self.target {
            self.last_ms = Some(now_ms);
            self.taken += 1;
            self.min = self.min.min(raw);
            self.max = self.max.max(raw);
            self.sum += raw as u32;
        }
        self.taken >= self.target
    }

    pub fn taken(&self) -> u8 {
        self.taken
    }

    pub fn report(&self, config: &ReflectorConfig) -> CalibrationReport {
        let avg = if self.taken == 0 {
            0
        } else {
            (self.sum / self.taken as u32) as u16
        };
        CalibrationReport {
            min: self.min,
            max: self.max,
            avg,
            min_v: config.code_to_volts(self.min),
            max_v: config.code_to_volts(self.max),
            avg_v: config.code_to_volts(avg),
            detect_threshold: config.detect_threshold,
            release_threshold: config.release_threshold,
        }
    }
}
