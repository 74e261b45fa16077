//! Interlock state machine
//!
//! Whether the vehicle may drive its motors is a function of this state
//! plus the orthogonal relay flag held by the interlock.

use super::events::Event;

/// Interlock states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterlockState {
    /// Power-on state; motors stopped
    #[default]
    Disarmed,
    /// Motor commands accepted (subject to relay and temperature)
    Armed,
    /// Mechanical brake engaged by the operator
    Braking,
    /// Emergency stop latched; brake engaged, relay off
    EmergencyStopped,
}

impl InterlockState {
    /// Check if this state arms the motors
    pub fn is_armed(&self) -> bool {
        matches!(self, InterlockState::Armed)
    }

    /// Check if the mechanical brake is engaged in this state
    pub fn brake_active(&self) -> bool {
        matches!(self, InterlockState::Braking | InterlockState::EmergencyStopped)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use InterlockState::*;

        match (self, event) {
            // Emergency stop from anywhere, including itself
            (_, EmergencyStop) => EmergencyStopped,

            (Disarmed, Arm) => Armed,
            (Disarmed, BrakeEngaged) => Braking,

            (Armed, Disarm) => Disarmed,
            (Armed, RelayLost) => Disarmed,
            // Brake and arming are mutually exclusive
            (Armed, BrakeEngaged) => Braking,

            (Braking, BrakeReleased) => Disarmed,

            // Releasing the brake is the way out of an emergency stop
            (EmergencyStopped, BrakeReleased) => Disarmed,

            _ => self,
        }
    }
}
