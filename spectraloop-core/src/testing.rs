//! Scripted hardware for host tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::traits::{AnalogInput, Board, EscOutput, SensorError, SwitchOutput, TemperatureProbe};

#[derive(Debug, Default)]
struct ProbeScript {
    readings: VecDeque<Result<f32, SensorError>>,
    last: Option<Result<f32, SensorError>>,
    present: bool,
    requests: u32,
}

/// Temperature probe replaying queued readings
///
/// Clones share the same script so a test can keep feeding a probe that
/// has been moved into the monitor. Once the queue runs dry the last
/// reading repeats.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    script: Rc<RefCell<ProbeScript>>,
}

impl ScriptedProbe {
    pub fn new(readings: &[f32]) -> Self {
        let probe = Self::default();
        probe.set_present(true);
        for &r in readings {
            probe.push(r);
        }
        probe
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn push(&self, reading: f32) {
        self.script.borrow_mut().readings.push_back(Ok(reading));
    }

    pub fn push_err(&self, err: SensorError) {
        self.script.borrow_mut().readings.push_back(Err(err));
    }

    /// Replace the queue with a value that repeats forever
    pub fn hold(&self, reading: f32) {
        let mut s = self.script.borrow_mut();
        s.readings.clear();
        s.last = Some(Ok(reading));
    }

    /// Replace the queue with an error that repeats forever
    pub fn hold_err(&self, err: SensorError) {
        let mut s = self.script.borrow_mut();
        s.readings.clear();
        s.last = Some(Err(err));
    }

    pub fn set_present(&self, present: bool) {
        self.script.borrow_mut().present = present;
    }

    pub fn requests(&self) -> u32 {
        self.script.borrow().requests
    }
}

impl TemperatureProbe for ScriptedProbe {
    fn probe(&mut self) -> bool {
        self.script.borrow().present
    }

    fn request_conversion(&mut self) -> Result<(), SensorError> {
        let mut s = self.script.borrow_mut();
        if !s.present {
            return Err(SensorError::NotPresent);
        }
        s.requests += 1;
        Ok(())
    }

    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let mut s = self.script.borrow_mut();
        if let Some(next) = s.readings.pop_front() {
            s.last = Some(next);
        }
        s.last.unwrap_or(Err(SensorError::Disconnected))
    }
}

/// ADC channel returning a settable code
#[derive(Debug, Clone)]
pub struct ScriptedAdc {
    code: Rc<RefCell<Result<u16, SensorError>>>,
}

impl ScriptedAdc {
    pub fn new(code: u16) -> Self {
        Self {
            code: Rc::new(RefCell::new(Ok(code))),
        }
    }

    pub fn set(&self, code: u16) {
        *self.code.borrow_mut() = Ok(code);
    }

    pub fn fail(&self) {
        *self.code.borrow_mut() = Err(SensorError::Bus);
    }
}

impl AnalogInput for ScriptedAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        *self.code.borrow()
    }
}

/// ESC recording every pulse written
#[derive(Debug, Clone, Default)]
pub struct RecordingEsc {
    pulses: Rc<RefCell<Vec<u16>>>,
}

impl RecordingEsc {
    pub fn last(&self) -> Option<u16> {
        self.pulses.borrow().last().copied()
    }

    pub fn writes(&self) -> usize {
        self.pulses.borrow().len()
    }
}

impl EscOutput for RecordingEsc {
    fn write_pulse_us(&mut self, pulse_us: u16) {
        self.pulses.borrow_mut().push(pulse_us);
    }
}

#[derive(Debug, Default)]
struct SwitchState {
    driven: bool,
    /// Force the readback to this level regardless of what is driven
    stuck: Option<bool>,
    toggles: u32,
}

/// Switch output with a readback that can be forced
#[derive(Debug, Clone, Default)]
pub struct MockSwitch {
    state: Rc<RefCell<SwitchState>>,
}

impl MockSwitch {
    pub fn driven(&self) -> bool {
        self.state.borrow().driven
    }

    pub fn toggles(&self) -> u32 {
        self.state.borrow().toggles
    }

    /// Simulate an output that reads back at a fixed level
    pub fn stick(&self, level: Option<bool>) {
        self.state.borrow_mut().stuck = level;
    }
}

impl SwitchOutput for MockSwitch {
    fn set_active(&mut self, active: bool) {
        let mut s = self.state.borrow_mut();
        if s.driven != active {
            s.toggles += 1;
        }
        s.driven = active;
    }

    fn is_active(&mut self) -> bool {
        let s = self.state.borrow();
        s.stuck.unwrap_or(s.driven)
    }
}

/// Board made of the scripted parts
pub struct MockBoard;

impl Board for MockBoard {
    type Probe = ScriptedProbe;
    type Reflector = ScriptedAdc;
    type Esc = RecordingEsc;
    type Relay = MockSwitch;
    type Buzzer = MockSwitch;
    type Led = MockSwitch;
}
