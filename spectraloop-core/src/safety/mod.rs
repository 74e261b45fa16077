//! Safety interlock
//!
//! Gates arming and motor commands on brake, relay and temperature state,
//! and forces the vehicle into a safe state on demand.

pub mod interlock;

pub use interlock::{
    InterlockError, InterlockEvent, NotReadyReason, SafetyInterlock, ThermalView,
};
