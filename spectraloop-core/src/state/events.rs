//! Events that drive the interlock state machine

/// Interlock events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Operator events
    /// Arming preconditions passed
    Arm,
    /// Operator disarmed
    Disarm,
    /// Mechanical brake engaged
    BrakeEngaged,
    /// Mechanical brake released
    BrakeReleased,

    // Safety events
    /// Power relay disengaged
    RelayLost,
    /// Emergency stop, from the operator or the temperature alarm
    EmergencyStop,
}

impl Event {
    /// Check if this event removes drive from the motors
    pub fn stops_motors(&self) -> bool {
        matches!(
            self,
            Event::Disarm | Event::BrakeEngaged | Event::RelayLost | Event::EmergencyStop
        )
    }

    /// Check if this event comes from the safety path rather than the operator
    pub fn is_safety_event(&self) -> bool {
        matches!(self, Event::RelayLost | Event::EmergencyStop)
    }
}
