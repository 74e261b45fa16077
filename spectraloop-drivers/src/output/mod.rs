//! On/off output implementations

pub mod gpio;

pub use gpio::GpioSwitch;
