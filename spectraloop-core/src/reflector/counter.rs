//! Debounced reflector pulse counter
//!
//! The analog channel is classified with two thresholds: the raw state
//! flips to "present" only past the detect threshold and back to "clear"
//! only past the release threshold. A raw flip must then persist for
//! `stable_ms` before the stable state follows it. Only a confirmed
//! clear-to-present transition counts.

use heapless::HistoryBuffer;
use spectraloop_protocol::{CalibrationReport, ReflectorReport};

use super::calibration::Calibration;
use crate::config::{ReflectorConfig, ReflectorPolarity};
use crate::traits::{AnalogInput, SensorError};

/// Inter-edge intervals kept for the average speed
pub const SPEED_WINDOW: usize = 10;

const MS_PER_MINUTE: f32 = 60_000.0;

/// A confirmed reflector edge
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReflectorEvent {
    /// Count after this edge
    pub count: u64,
    pub voltage: f32,
    /// Instantaneous speed in reflectors per minute
    pub speed_rpm: f32,
}

/// Reflector counter over an analog input
pub struct ReflectorCounter<A> {
    adc: A,
    config: ReflectorConfig,

    raw: u16,
    /// Last read succeeded
    active: bool,
    detected: bool,
    pending_since: Option<u32>,

    count: u64,
    detections: u64,
    last_edge_ms: Option<u32>,
    intervals: HistoryBuffer<u32, SPEED_WINDOW>,
    instant_rpm: f32,
    average_rpm: f32,

    reads: u64,
    stats_reads: u64,
    stats_ms: u32,
    read_freq_hz: f32,

    calibration: Option<Calibration>,
    calibration_result: Option<CalibrationReport>,
}

impl<A: AnalogInput> ReflectorCounter<A> {
    pub fn new(adc: A, config: ReflectorConfig) -> Self {
        Self {
            adc,
            config,
            raw: 0,
            active: false,
            detected: false,
            pending_since: None,
            count: 0,
            detections: 0,
            last_edge_ms: None,
            intervals: HistoryBuffer::new(),
            instant_rpm: 0.0,
            average_rpm: 0.0,
            reads: 0,
            stats_reads: 0,
            stats_ms: 0,
            read_freq_hz: 0.0,
            calibration: None,
            calibration_result: None,
        }
    }

    /// Take one reading and advance the debounce
    ///
    /// Returns the edge if this reading confirmed a new reflector.
    pub fn sample(&mut self, now_ms: u32) -> Result<Option<ReflectorEvent>, SensorError> {
        let raw = match self.adc.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                self.active = false;
                return Err(e);
            }
        };
        self.raw = raw;
        self.active = true;
        self.reads = self.reads.wrapping_add(1);

        self.feed_calibration(now_ms, raw);
        self.decay_speed(now_ms);

        let raw_state = self.classify(raw);
        if raw_state == self.detected {
            self.pending_since = None;
            return Ok(None);
        }

        let since = *self.pending_since.get_or_insert(now_ms);
        if now_ms.wrapping_sub(since) < self.config.stable_ms {
            return Ok(None);
        }

        self.pending_since = None;
        self.detected = raw_state;
        if !raw_state {
            return Ok(None);
        }
        Ok(Some(self.record_edge(now_ms)))
    }

    /// Clear the count and restart the speed window
    pub fn reset(&mut self, now_ms: u32) {
        self.count = 0;
        self.detections = 0;
        self.intervals.clear();
        self.instant_rpm = 0.0;
        self.average_rpm = 0.0;
        self.last_edge_ms = None;
        self.stats_ms = now_ms;
        self.stats_reads = self.reads;
    }

    /// Refresh the read frequency
    pub fn update_stats(&mut self, now_ms: u32) {
        let elapsed = now_ms.wrapping_sub(self.stats_ms);
        if elapsed == 0 {
            return;
        }
        let reads = self.reads.wrapping_sub(self.stats_reads);
        self.read_freq_hz = reads as f32 * 1000.0 / elapsed as f32;
        self.stats_reads = self.reads;
        self.stats_ms = now_ms;
    }

    /// Begin a calibration run; readings are gathered by [`Self::sample`]
    pub fn start_calibration(&mut self) {
        self.calibration = Some(Calibration::new(
            self.config.calibration_samples,
            self.config.calibration_interval_ms,
        ));
        self.calibration_result = None;
    }

    pub fn calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Finished calibration result, if one is waiting
    pub fn take_calibration(&mut self) -> Option<CalibrationReport> {
        self.calibration_result.take()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn voltage(&self) -> f32 {
        self.config.code_to_volts(self.raw)
    }

    pub fn detected(&self) -> bool {
        self.detected
    }

    pub fn instant_rpm(&self) -> f32 {
        self.instant_rpm
    }

    pub fn average_rpm(&self) -> f32 {
        self.average_rpm
    }

    pub fn read_freq_hz(&self) -> f32 {
        self.read_freq_hz
    }

    pub fn config(&self) -> &ReflectorConfig {
        &self.config
    }

    pub fn report(&self) -> ReflectorReport {
        ReflectorReport {
            count: self.count,
            voltage: self.voltage(),
            detected: self.detected,
            avg_rpm: self.average_rpm,
            inst_rpm: self.instant_rpm,
            detections: self.detections,
            reads: self.reads,
            read_freq_hz: self.read_freq_hz,
            active: self.active,
        }
    }

    /// Raw state with hysteresis around the current stable state
    fn classify(&self, raw: u16) -> bool {
        let c = &self.config;
        match (c.polarity, self.detected) {
            (ReflectorPolarity::ActiveLow, false) => raw < c.detect_threshold,
            (ReflectorPolarity::ActiveLow, true) => raw <= c.release_threshold,
            (ReflectorPolarity::ActiveHigh, false) => raw > c.detect_threshold,
            (ReflectorPolarity::ActiveHigh, true) => raw >= c.release_threshold,
        }
    }

    fn record_edge(&mut self, now_ms: u32) -> ReflectorEvent {
        self.count = self.count.wrapping_add(1);
        self.detections = self.detections.wrapping_add(1);

        if let Some(last) = self.last_edge_ms {
            let dt = now_ms.wrapping_sub(last);
            if dt > 0 {
                self.instant_rpm = MS_PER_MINUTE / dt as f32;
                self.intervals.write(dt);
                let total: u32 = self.intervals.as_slice().iter().sum();
                self.average_rpm = MS_PER_MINUTE * self.intervals.len() as f32 / total as f32;
            }
        }
        self.last_edge_ms = Some(now_ms);

        ReflectorEvent {
            count: self.count,
            voltage: self.voltage(),
            speed_rpm: self.instant_rpm,
        }
    }

    fn decay_speed(&mut self, now_ms: u32) {
        let Some(last) = self.last_edge_ms else {
            return;
        };
        if now_ms.wrapping_sub(last) > self.config.speed_timeout_ms {
            self.instant_rpm = 0.0;
            self.average_rpm = 0.0;
            self.intervals.clear();
            // Next edge starts a fresh interval
            self.last_edge_ms = None;
        }
    }

    fn feed_calibration(&mut self, now_ms: u32, raw: u16) {
        let Some(cal) = self.calibration.as_mut() else {
            return;
        };
        if cal.offer(now_ms, raw) {
            self.calibration_result = Some(cal.report(&self.config));
            self.calibration = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAdc;
    use proptest::prelude::*;

    const CLEAR: u16 = 4095;
    const PRESENT: u16 = 3000;

    fn counter() -> (ReflectorCounter<ScriptedAdc>, ScriptedAdc) {
        let adc = ScriptedAdc::new(CLEAR);
        (ReflectorCounter::new(adc.clone(), ReflectorConfig::default()), adc)
    }

    /// Hold a code for `duration` ms, sampling every 5 ms
    fn hold(
        c: &mut ReflectorCounter<ScriptedAdc>,
        adc: &ScriptedAdc,
        code: u16,
        now: &mut u32,
        duration: u32,
    ) -> u32 {
        adc.set(code);
        let mut edges = 0;
        let end = *now + duration;
        while *now < end {
            if c.sample(*now).unwrap().is_some() {
                edges += 1;
            }
            *now += 5;
        }
        edges
    }

    #[test]
    fn test_edge_counted_once() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, CLEAR, &mut now, 50);
        assert_eq!(hold(&mut c, &adc, PRESENT, &mut now, 50), 1);
        assert!(c.detected());
        assert_eq!(hold(&mut c, &adc, CLEAR, &mut now, 50), 0);
        assert!(!c.detected());
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_short_pulse_ignored() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, CLEAR, &mut now, 20);
        // One 5 ms sample is shorter than the stable time
        hold(&mut c, &adc, PRESENT, &mut now, 5);
        hold(&mut c, &adc, CLEAR, &mut now, 20);
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn test_hysteresis_band_holds_state() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, PRESENT, &mut now, 30);
        assert!(c.detected());
        // Between detect and release: no change either way
        hold(&mut c, &adc, 3900, &mut now, 100);
        assert!(c.detected());
        hold(&mut c, &adc, CLEAR, &mut now, 30);
        assert!(!c.detected());
        hold(&mut c, &adc, 3900, &mut now, 100);
        assert!(!c.detected());
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_active_high_polarity() {
        let adc = ScriptedAdc::new(100);
        let config = ReflectorConfig {
            polarity: ReflectorPolarity::ActiveHigh,
            detect_threshold: 3000,
            release_threshold: 2500,
            ..ReflectorConfig::default()
        };
        let mut c = ReflectorCounter::new(adc.clone(), config);
        let mut now = 0;
        hold(&mut c, &adc, 100, &mut now, 30);
        assert_eq!(hold(&mut c, &adc, 3500, &mut now, 30), 1);
        hold(&mut c, &adc, 2700, &mut now, 30);
        assert!(c.detected());
    }

    #[test]
    fn test_speed_from_edge_intervals() {
        let (mut c, adc) = counter();
        let mut now = 0;
        // Edges 100 ms apart: 600 per minute
        for _ in 0..4 {
            hold(&mut c, &adc, PRESENT, &mut now, 50);
            hold(&mut c, &adc, CLEAR, &mut now, 50);
        }
        assert_eq!(c.count(), 4);
        assert!((c.instant_rpm() - 600.0).abs() < 0.01);
        assert!((c.average_rpm() - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_average_uses_partial_window() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, PRESENT, &mut now, 50);
        hold(&mut c, &adc, CLEAR, &mut now, 50);
        hold(&mut c, &adc, PRESENT, &mut now, 50);
        hold(&mut c, &adc, CLEAR, &mut now, 150);
        hold(&mut c, &adc, PRESENT, &mut now, 50);
        // Intervals 100 and 200 ms
        assert!((c.instant_rpm() - 300.0).abs() < 0.01);
        assert!((c.average_rpm() - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_speed_decays_without_edges() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, PRESENT, &mut now, 50);
        hold(&mut c, &adc, CLEAR, &mut now, 50);
        hold(&mut c, &adc, PRESENT, &mut now, 50);
        assert!(c.instant_rpm() > 0.0);
        hold(&mut c, &adc, CLEAR, &mut now, 5100);
        assert_eq!(c.instant_rpm(), 0.0);
        assert_eq!(c.average_rpm(), 0.0);
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn test_reset_clears_count_and_speed() {
        let (mut c, adc) = counter();
        let mut now = 0;
        for _ in 0..3 {
            hold(&mut c, &adc, PRESENT, &mut now, 50);
            hold(&mut c, &adc, CLEAR, &mut now, 50);
        }
        c.reset(now);
        let report = c.report();
        assert_eq!(report.count, 0);
        assert_eq!(report.avg_rpm, 0.0);
        assert_eq!(report.inst_rpm, 0.0);
    }

    #[test]
    fn test_read_failure_marks_inactive() {
        let (mut c, adc) = counter();
        c.sample(0).unwrap();
        assert!(c.report().active);
        adc.fail();
        assert_eq!(c.sample(5), Err(SensorError::Bus));
        assert!(!c.report().active);
    }

    #[test]
    fn test_read_frequency() {
        let (mut c, adc) = counter();
        let mut now = 0;
        hold(&mut c, &adc, CLEAR, &mut now, 1000);
        c.update_stats(now);
        assert!((c.read_freq_hz() - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_calibration_runs_without_blocking() {
        let (mut c, adc) = counter();
        c.start_calibration();
        let mut now = 0;
        let mut code = 3000;
        while c.calibrating() {
            adc.set(code);
            c.sample(now).unwrap();
            now += 5;
            if now % 50 == 0 {
                code += 100;
            }
        }
        let report = c.take_calibration().unwrap();
        assert_eq!(report.min, 3000);
        assert_eq!(report.max, 3900);
        assert_eq!(report.avg, 3450);
        assert_eq!(report.detect_threshold, 3803);
        assert!(c.take_calibration().is_none());
    }

    proptest! {
        #[test]
        fn toggling_faster_than_debounce_never_counts(toggles in prop::collection::vec(any::<bool>(), 1..200)) {
            let (mut c, adc) = counter();
            let mut now = 0;
            let mut last = false;
            let mut run = 0u32;
            for t in toggles {
                // Force a flip at least every second sample (< 10 ms)
                let present = if run >= 1 { !last } else { t };
                if present == last { run += 1 } else { run = 0 }
                last = present;
                adc.set(if present { PRESENT } else { CLEAR });
                prop_assert!(c.sample(now).unwrap().is_none());
                now += 5;
            }
            prop_assert_eq!(c.count(), 0);
        }

        #[test]
        fn count_matches_held_pulses(pulses in 1usize..20) {
            let (mut c, adc) = counter();
            let mut now = 0;
            for _ in 0..pulses {
                hold(&mut c, &adc, PRESENT, &mut now, 20);
                hold(&mut c, &adc, CLEAR, &mut now, 20);
            }
            prop_assert_eq!(c.count(), pulses as u64);
        }
    }
}
