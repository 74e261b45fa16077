//! Operator indicators

mod annunciator;

pub use annunciator::{AlarmLatched, Annunciator};
