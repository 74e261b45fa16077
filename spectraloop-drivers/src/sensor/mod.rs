//! Temperature sensor implementations

pub mod ds18b20;
pub mod onewire;

pub use ds18b20::{Ds18b20, CONVERSION_MS};
pub use onewire::OneWireBus;
