//! SpectraLoop host link protocol
//!
//! This crate defines the newline-terminated ASCII protocol between the
//! vehicle controller and the host backend. The protocol is deliberately
//! plain so it can be driven from a serial terminal.
//!
//! # Protocol Overview
//!
//! ```text
//! host    -> vehicle : MOTOR:1:START:50\n
//! vehicle -> host    : ACK:MOTOR:1:START:50 [TEMP1:24.50] [TEMP2:24.75] [MAX:24.75] [REFLECTOR:12]\n
//! vehicle -> host    : MOTOR_STARTED:1:50 [REFLECTOR:12]\n
//! ```
//!
//! Every inbound line is acknowledged, then answered with zero or more
//! result lines. Errors are reported as `ERROR:<reason>` lines. Periodic
//! telemetry (`HEARTBEAT:`, `DUAL_TEMP`, `REFLECTOR_STATUS`, `PERFORMANCE:`)
//! is interleaved with command responses.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod line;
pub mod response;

pub use command::{Command, Group, MotorAction, ParseError, MAX_SPEED};
pub use line::{Line, LineAssembler, LineError, MAX_LINE_LEN};
pub use response::{
    BypassCause, CalibrationReport, HeartbeatReport, MotorSnapshot, PerformanceReport,
    ReflectorReport, Refusal, Response, SensorNotice, StatusReport, StopCause, TempPair,
    ThermalReport, FIRMWARE_TAG, MAX_REPORTED_MOTORS,
};
