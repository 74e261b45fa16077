//! Embassy tasks
//!
//! - `serial_rx`: assembles host lines
//! - `serial_tx`: writes responses
//! - `control`: runs the vehicle controller on a 1 ms tick
//! - `probes`: converts and reads the temperature probes

mod control;
mod probes;
mod serial_rx;
mod serial_tx;

pub use control::{control_task, now_ms};
pub use probes::probe_task;
pub use serial_rx::serial_rx_task;
pub use serial_tx::serial_tx_task;
