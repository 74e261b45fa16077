//! Reflector pulse counting

mod calibration;
mod counter;

pub use calibration::Calibration;
pub use counter::{ReflectorCounter, ReflectorEvent, SPEED_WINDOW};
