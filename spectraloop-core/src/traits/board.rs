//! Board definition
//!
//! A board bundles the concrete hardware types the controller drives.

use heapless::Vec;

use super::{AnalogInput, EscOutput, SwitchOutput, TemperatureProbe};
use crate::config::{MAX_MOTORS, MAX_TEMP_CHANNELS};

/// Hardware types for one vehicle controller
pub trait Board {
    /// Temperature probe channel
    type Probe: TemperatureProbe;
    /// Reflector sensor ADC channel
    type Reflector: AnalogInput;
    /// ESC output channel
    type Esc: EscOutput;
    /// Brake power relay
    type Relay: SwitchOutput;
    /// Alarm buzzer
    type Buzzer: SwitchOutput;
    /// Reflector status LED
    type Led: SwitchOutput;
}

/// Initialized hardware handed to the controller
pub struct BoardParts<B: Board> {
    /// Probe channels in sensor order
    pub probes: Vec<B::Probe, MAX_TEMP_CHANNELS>,
    pub reflector: B::Reflector,
    /// ESC channels in motor order
    pub escs: Vec<B::Esc, MAX_MOTORS>,
    pub relay: B::Relay,
    pub buzzer: B::Buzzer,
    pub led: B::Led,
}
