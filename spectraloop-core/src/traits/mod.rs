//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and hardware-specific implementations.

pub mod board;
pub mod output;
pub mod sensor;

pub use board::{Board, BoardParts};
pub use output::{EscOutput, SwitchOutput};
pub use sensor::{AnalogInput, SensorError, TemperatureProbe};
