//! Safety interlock
//!
//! Owns the interlock state machine and the power relay output, and is
//! the single gate every motor command passes. Temperature conditions
//! come in as a [`ThermalView`] snapshot so the interlock never talks to
//! the sensors itself.

use crate::config::ThermalConfig;
use crate::motor::MotorBank;
use crate::state::{Event, InterlockState};
use crate::traits::{EscOutput, SwitchOutput};

/// Why an arm or start request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotReadyReason {
    BrakeActive,
    RelayOff,
    TemperatureAlarm,
    /// Fused temperature within the safety margin of the alarm threshold
    TemperatureMargin,
    /// Monitoring is mandatory but no channel delivers a value
    NoTemperatureSensors,
    NotArmed,
}

impl NotReadyReason {
    /// Token used on the wire
    pub fn reason(&self) -> &'static str {
        match self {
            NotReadyReason::BrakeActive => "Brake_active",
            NotReadyReason::RelayOff => "Relay_off",
            NotReadyReason::TemperatureAlarm => "Temperature_alarm",
            NotReadyReason::TemperatureMargin => "Temperature_margin",
            NotReadyReason::NoTemperatureSensors => "No_temperature_sensors",
            NotReadyReason::NotArmed => "Not_armed",
        }
    }
}

/// Interlock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterlockError {
    NotReady(NotReadyReason),
}

/// Hardware corrections made by [`SafetyInterlock::reconcile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterlockEvent {
    /// Relay read back off and was driven on again
    RelayReasserted,
    /// Relay stayed off after re-assertion; motors stopped and disarmed
    RelayFailed,
}

/// Temperature conditions seen by the interlock
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalView {
    pub fused_c: f32,
    pub alarm: bool,
    /// Temperature gate applies (not bypassed)
    pub mandatory: bool,
    /// `fused_c` comes from at least one connected channel
    pub live: bool,
}

/// Arm/brake/relay interlock
pub struct SafetyInterlock<R> {
    relay: R,
    relay_on: bool,
    state: InterlockState,
    alarm_c: f32,
    arm_margin_c: f32,
    start_margin_c: f32,
}

impl<R: SwitchOutput> SafetyInterlock<R> {
    /// Create the interlock; the relay starts released
    pub fn new(mut relay: R, thermal: &ThermalConfig) -> Self {
        relay.set_active(false);
        Self {
            relay,
            relay_on: false,
            state: InterlockState::Disarmed,
            alarm_c: thermal.alarm_c,
            arm_margin_c: thermal.arm_margin_c,
            start_margin_c: thermal.start_margin_c,
        }
    }

    /// Arm the motors
    pub fn arm(&mut self, view: &ThermalView) -> Result<(), InterlockError> {
        self.check_ready(view, self.arm_margin_c)?;
        self.state = self.state.transition(Event::Arm);
        Ok(())
    }

    /// Disarm and stop every motor; always succeeds
    pub fn disarm<E: EscOutput>(&mut self, motors: &mut MotorBank<E>) {
        motors.stop_all();
        self.state = self.state.transition(Event::Disarm);
    }

    /// Engage or release the power relay
    ///
    /// Engaging is refused while the temperature alarm is latched.
    /// Releasing stops every motor and disarms.
    pub fn set_relay_brake<E: EscOutput>(
        &mut self,
        active: bool,
        view: &ThermalView,
        motors: &mut MotorBank<E>,
    ) -> Result<(), InterlockError> {
        if active && view.alarm {
            return Err(InterlockError::NotReady(NotReadyReason::TemperatureAlarm));
        }
        self.relay.set_active(active);
        self.relay_on = active;
        if !active {
            motors.stop_all();
            self.state = self.state.transition(Event::RelayLost);
        }
        Ok(())
    }

    /// Engage or release the mechanical brake
    ///
    /// Engaging stops every motor. Releasing also clears an emergency stop.
    pub fn set_brake<E: EscOutput>(&mut self, active: bool, motors: &mut MotorBank<E>) {
        if active {
            motors.stop_all();
            self.state = self.state.transition(Event::BrakeEngaged);
        } else {
            self.state = self.state.transition(Event::BrakeReleased);
        }
    }

    /// Stop everything: motors to neutral, relay off, brake on, disarmed
    ///
    /// Callable from any state, any number of times.
    pub fn emergency_stop<E: EscOutput>(&mut self, motors: &mut MotorBank<E>) {
        motors.stop_all();
        self.relay.set_active(false);
        self.relay_on = false;
        self.state = self.state.transition(Event::EmergencyStop);
    }

    /// Check whether a motor command may run
    pub fn check_start(&self, view: &ThermalView) -> Result<(), InterlockError> {
        if !self.state.is_armed() {
            return Err(InterlockError::NotReady(NotReadyReason::NotArmed));
        }
        self.check_ready(view, self.start_margin_c)
    }

    /// Boolean form of [`Self::check_start`]
    pub fn can_start_motors(&self, view: &ThermalView) -> bool {
        self.check_start(view).is_ok()
    }

    /// Bring the relay output back in line with the commanded state
    pub fn reconcile<E: EscOutput>(&mut self, motors: &mut MotorBank<E>) -> Option<InterlockEvent> {
        if !self.relay_on || self.relay.is_active() {
            return None;
        }
        self.relay.set_active(true);
        if self.relay.is_active() {
            return Some(InterlockEvent::RelayReasserted);
        }
        self.relay.set_active(false);
        self.relay_on = false;
        motors.stop_all();
        self.state = self.state.transition(Event::RelayLost);
        Some(InterlockEvent::RelayFailed)
    }

    pub fn state(&self) -> InterlockState {
        self.state
    }

    pub fn armed(&self) -> bool {
        self.state.is_armed()
    }

    pub fn brake_active(&self) -> bool {
        self.state.brake_active()
    }

    pub fn relay_active(&self) -> bool {
        self.relay_on
    }

    fn check_ready(&self, view: &ThermalView, margin_c: f32) -> Result<(), InterlockError> {
        let refuse = |reason| Err(InterlockError::NotReady(reason));
        if self.state.brake_active() {
            return refuse(NotReadyReason::BrakeActive);
        }
        if !self.relay_on {
            return refuse(NotReadyReason::RelayOff);
        }
        if !view.mandatory {
            return Ok(());
        }
        if view.alarm {
            return refuse(NotReadyReason::TemperatureAlarm);
        }
        if !view.live {
            return refuse(NotReadyReason::NoTemperatureSensors);
        }
        if view.fused_c > self.alarm_c - margin_c {
            return refuse(NotReadyReason::TemperatureMargin);
        }
        Ok(())
    }
}
