//! Board-agnostic core logic for the SpectraLoop vehicle firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (temperature probe, ADC, ESC, switches)
//! - Dual-channel temperature monitor with fault-tolerant bypass
//! - Debounced reflector pulse counter
//! - Arming interlock state machine
//! - Motor bank with levitation and thrust groups
//! - Periodic task schedule
//! - Configuration types and the embedded config parser
//! - The command dispatcher tying it all together

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod alert;
pub mod config;
pub mod controller;
pub mod motor;
pub mod reflector;
pub mod safety;
pub mod scheduler;
pub mod state;
pub mod thermal;
pub mod traits;

#[cfg(test)]
mod testing;
