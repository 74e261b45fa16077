//! Buzzer and status LED

use crate::traits::SwitchOutput;

/// Buzzer cannot be silenced while the temperature alarm is latched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmLatched;

/// Audible and visual indicators
pub struct Annunciator<B, L> {
    buzzer: B,
    led: L,
    /// Buzzer requested by the temperature alarm
    requested: bool,
    level: bool,
}

impl<B: SwitchOutput, L: SwitchOutput> Annunciator<B, L> {
    pub fn new(mut buzzer: B, mut led: L) -> Self {
        buzzer.set_active(false);
        led.set_active(false);
        Self {
            buzzer,
            led,
            requested: false,
            level: false,
        }
    }

    /// Start sounding; the buzzer pulses on each [`Self::tick`]
    pub fn raise(&mut self) {
        self.requested = true;
    }

    /// Stop sounding once the alarm has cleared
    pub fn clear(&mut self) {
        self.requested = false;
        self.quiet();
    }

    /// Operator request to silence the buzzer
    pub fn silence(&mut self, alarm: bool) -> Result<(), AlarmLatched> {
        if alarm {
            return Err(AlarmLatched);
        }
        self.clear();
        Ok(())
    }

    /// Advance the buzzer pattern by one period
    pub fn tick(&mut self, alarm: bool) {
        if alarm && self.requested {
            self.level = !self.level;
            self.buzzer.set_active(self.level);
        } else if self.level {
            self.quiet();
        }
    }

    /// LED mirrors the reflector state
    pub fn set_led(&mut self, on: bool) {
        self.led.set_active(on);
    }

    pub fn buzzer_active(&self) -> bool {
        self.requested
    }

    fn quiet(&mut self) {
        self.level = false;
        self.buzzer.set_active(false);
    }
}
