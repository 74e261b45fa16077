//! Motor bank and group control

mod bank;

pub use bank::{Motor, MotorBank};
