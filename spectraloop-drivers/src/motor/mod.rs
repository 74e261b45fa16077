//! Motor driver implementations

pub mod esc;

pub use esc::{Esc, ESC_PERIOD_US};
