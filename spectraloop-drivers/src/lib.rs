//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in spectraloop-core on top of `embedded-hal` 1.0:
//!
//! - Temperature probes (DS18B20 over an async 1-Wire bus)
//! - ESC outputs (50 Hz servo-style PWM)
//! - Switch outputs (relay, buzzer, LED on a GPIO)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod motor;
pub mod output;
pub mod sensor;
