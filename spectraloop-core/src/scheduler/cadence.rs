//! Elapsed-time cadence

/// A fixed period measured against a free-running millisecond clock
///
/// Comparisons use wrapping arithmetic so the clock may roll over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cadence {
    period_ms: u32,
    last_run_ms: u32,
}

impl Cadence {
    pub const fn new(period_ms: u32, now_ms: u32) -> Self {
        Self {
            period_ms,
            last_run_ms: now_ms,
        }
    }

    /// Check whether the period has elapsed, restarting it if so
    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_run_ms) >= self.period_ms {
            self.last_run_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Restart the period from `now_ms`
    pub fn reset(&mut self, now_ms: u32) {
        self.last_run_ms = now_ms;
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}
