//! Interlock state machine
//!
//! Explicit, finite and deterministic. The relay is tracked beside it by
//! the safety interlock since it can change in any state.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::InterlockState;
