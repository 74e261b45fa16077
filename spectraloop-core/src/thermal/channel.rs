//! A single temperature probe channel
//!
//! Each channel tracks its own connectivity and filters readings before
//! they become visible. A reading is accepted only if it lies inside the
//! validity window and is within `max_step_c` of the previous accepted
//! reading. A jump larger than that is held as a candidate and accepted
//! when the next reading agrees with it, so a real temperature rise is
//! delayed by one conversion at most.

use crate::config::ThermalConfig;
use crate::traits::{SensorError, TemperatureProbe};

/// Outcome of collecting a conversion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelUpdate {
    /// Nothing collected (disconnected, nothing pending, or still converting)
    Idle,
    /// Reading accepted; `changed` if the visible value moved past the sensitivity
    Accepted { changed: bool },
    /// Reading failed validity or plausibility
    Rejected,
    /// Reading failed and the channel hit its failure threshold
    Disconnected,
}

/// Temperature probe channel with connectivity tracking
#[derive(Debug)]
pub struct SensorChannel<P> {
    probe: P,
    connected: bool,
    /// Externally visible value
    current_c: Option<f32>,
    /// Last reading that passed both checks
    last_valid_c: Option<f32>,
    last_valid_ms: u32,
    consecutive_failures: u8,
    /// Highest accepted reading since boot
    peak_c: Option<f32>,
    /// Time the pending conversion was requested
    pending_since: Option<u32>,
    /// Implausible jump waiting for confirmation
    candidate_c: Option<f32>,
}

impl<P: TemperatureProbe> SensorChannel<P> {
    /// Create a channel; it starts disconnected until probed
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            connected: false,
            current_c: None,
            last_valid_c: None,
            last_valid_ms: 0,
            consecutive_failures: 0,
            peak_c: None,
            pending_since: None,
            candidate_c: None,
        }
    }

    /// Probe for the device and mark the channel connected if it answers
    pub fn connect(&mut self, now_ms: u32) -> bool {
        if !self.probe.probe() {
            return false;
        }
        self.connected = true;
        self.consecutive_failures = 0;
        self.last_valid_ms = now_ms;
        // Nothing is visible until a fresh reading is accepted
        self.current_c = None;
        self.last_valid_c = None;
        self.candidate_c = None;
        self.pending_since = None;
        true
    }

    /// Mark the channel disconnected
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.pending_since = None;
        self.candidate_c = None;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Visible value, only while connected
    pub fn value(&self) -> Option<f32> {
        if self.connected {
            self.current_c
        } else {
            None
        }
    }

    pub fn peak(&self) -> Option<f32> {
        self.peak_c
    }

    pub fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    /// Start a conversion if none is pending
    ///
    /// Returns `true` if the failure threshold was reached.
    pub fn request(&mut self, now_ms: u32, config: &ThermalConfig) -> bool {
        if !self.connected || self.pending_since.is_some() {
            return false;
        }
        match self.probe.request_conversion() {
            Ok(()) => {
                self.pending_since = Some(now_ms);
                false
            }
            Err(_) => self.record_failure(config),
        }
    }

    /// Collect a finished conversion
    pub fn collect(&mut self, now_ms: u32, config: &ThermalConfig) -> ChannelUpdate {
        if !self.connected {
            return ChannelUpdate::Idle;
        }
        let Some(since) = self.pending_since else {
            return ChannelUpdate::Idle;
        };
        if now_ms.wrapping_sub(since) < config.conversion_ms {
            return ChannelUpdate::Idle;
        }
        let reading = match self.probe.read_celsius() {
            Err(SensorError::Busy) => return ChannelUpdate::Idle,
            Ok(v) if is_valid(v, config) => v,
            _ => {
                self.pending_since = None;
                return self.reject(config);
            }
        };
        self.pending_since = None;

        if let Some(last) = self.last_valid_c {
            if (reading - last).abs() > config.max_step_c {
                let confirmed = self
                    .candidate_c
                    .is_some_and(|c| (reading - c).abs() <= config.max_step_c);
                if !confirmed {
                    self.candidate_c = Some(reading);
                    return self.reject(config);
                }
            }
        }

        ChannelUpdate::Accepted {
            changed: self.accept(reading, now_ms, config),
        }
    }

    /// Drop the channel if no valid reading arrived within the timeout
    ///
    /// Returns `true` if the channel was dropped.
    pub fn check_stale(&mut self, now_ms: u32, config: &ThermalConfig) -> bool {
        if self.connected && now_ms.wrapping_sub(self.last_valid_ms) > config.stale_timeout_ms {
            self.disconnect();
            return true;
        }
        false
    }

    fn accept(&mut self, reading: f32, now_ms: u32, config: &ThermalConfig) -> bool {
        self.consecutive_failures = 0;
        self.candidate_c = None;
        self.last_valid_c = Some(reading);
        self.last_valid_ms = now_ms;
        self.peak_c = Some(self.peak_c.map_or(reading, |p| p.max(reading)));

        let changed = self
            .current_c
            .map_or(true, |c| (reading - c).abs() > config.sensitivity_c);
        if changed {
            self.current_c = Some(reading);
        }
        changed
    }

    fn reject(&mut self, config: &ThermalConfig) -> ChannelUpdate {
        if self.record_failure(config) {
            ChannelUpdate::Disconnected
        } else {
            ChannelUpdate::Rejected
        }
    }

    fn record_failure(&mut self, config: &ThermalConfig) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= config.failure_threshold {
            self.disconnect();
            return true;
        }
        false
    }
}

/// Check a raw reading against the validity window and the sentinel
fn is_valid(v: f32, config: &ThermalConfig) -> bool {
    v > config.valid_min_c && v < config.valid_max_c && v != config.disconnected_sentinel_c
}
