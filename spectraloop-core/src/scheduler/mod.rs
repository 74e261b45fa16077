//! Cooperative task schedule
//!
//! Every subsystem runs on its own cadence against one millisecond clock.
//! Nothing here blocks; the control loop polls the schedule each pass and
//! runs whatever is due.

pub mod cadence;
pub mod schedule;

pub use cadence::Cadence;
pub use schedule::{DueTasks, Schedule, Task, TASK_COUNT};
