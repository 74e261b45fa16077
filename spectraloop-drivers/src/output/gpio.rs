//! GPIO switch output
//!
//! Relay, buzzer and LED outputs on a plain GPIO. The pin can be
//! configured as active-high (default) or active-low for relay boards
//! that switch on a low input.

use embedded_hal::digital::StatefulOutputPin;
use spectraloop_core::traits::SwitchOutput;

/// On/off output on one GPIO pin
pub struct GpioSwitch<P> {
    pin: P,
    /// If true, active = pin LOW
    inverted: bool,
}

impl<P: StatefulOutputPin> GpioSwitch<P> {
    /// Create the output, starting inactive
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut switch = Self { pin, inverted };
        switch.set_active(false);
        switch
    }

    pub fn new_active_high(pin: P) -> Self {
        Self::new(pin, false)
    }

    pub fn new_active_low(pin: P) -> Self {
        Self::new(pin, true)
    }
}

impl<P: StatefulOutputPin> SwitchOutput for GpioSwitch<P> {
    fn set_active(&mut self, active: bool) {
        // Pin errors surface through the readback
        let _ = if active != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }

    /// A failed read counts as inactive
    fn is_active(&mut self) -> bool {
        match self.pin.is_set_high() {
            Ok(high) => high != self.inverted,
            Err(_) => false,
        }
    }
}
