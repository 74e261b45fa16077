//! Actuator output traits

/// Trait for an RC-style ESC channel
///
/// Implementations translate a pulse width into whatever the PWM
/// peripheral needs (compare value, duty fraction).
pub trait EscOutput {
    /// Set the output pulse width in microseconds
    fn write_pulse_us(&mut self, pulse_us: u16);
}

/// Trait for an on/off output (relay, buzzer, LED)
pub trait SwitchOutput {
    /// Drive the output to its active or inactive level
    fn set_active(&mut self, active: bool);

    /// Read back the level currently driven on the output
    ///
    /// Takes `&mut self` because pin reads may require mutable access.
    fn is_active(&mut self) -> bool;
}
