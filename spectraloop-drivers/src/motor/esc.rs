//! RC-style ESC output
//!
//! ESCs take a 50 Hz servo signal whose high time sets the throttle.
//! The PWM slice must already run at [`ESC_PERIOD_US`]; this driver only
//! converts a pulse width into a duty cycle.

use embedded_hal::pwm::SetDutyCycle;
use spectraloop_core::traits::EscOutput;

/// Servo frame period
pub const ESC_PERIOD_US: u16 = 20_000;

/// ESC on one PWM channel
pub struct Esc<P> {
    pwm: P,
    pulse_us: u16,
    faults: u32,
}

impl<P: SetDutyCycle> Esc<P> {
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            pulse_us: 0,
            faults: 0,
        }
    }

    /// Pulse width last written
    pub fn pulse_us(&self) -> u16 {
        self.pulse_us
    }

    /// Number of duty cycle writes the PWM rejected
    pub fn faults(&self) -> u32 {
        self.faults
    }
}

impl<P: SetDutyCycle> EscOutput for Esc<P> {
    fn write_pulse_us(&mut self, pulse_us: u16) {
        let pulse_us = pulse_us.min(ESC_PERIOD_US);
        match self.pwm.set_duty_cycle_fraction(pulse_us, ESC_PERIOD_US) {
            Ok(()) => self.pulse_us = pulse_us,
            Err(_) => self.faults = self.faults.wrapping_add(1),
        }
    }
}
