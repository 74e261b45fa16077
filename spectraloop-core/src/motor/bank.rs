//! Motor bank
//!
//! Up to [`MAX_MOTORS`] ESC channels, addressed individually or through
//! the levitation and thrust groups. Per-motor state is authoritative;
//! the group speeds only remember the last group command.
//!
//! The bank does not check the interlock. Callers gate every command
//! through the safety interlock first.

use heapless::Vec;
use spectraloop_protocol::{Group, MotorSnapshot, MAX_SPEED};

use crate::config::{GroupRange, MotorConfig, MAX_MOTORS};
use crate::traits::EscOutput;

/// State of one motor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Motor {
    /// An ESC is fitted to this slot
    pub attached: bool,
    pub running: bool,
    /// Commanded speed, 0-100 %
    pub speed: u8,
}

/// Bank of ESC-driven motors
pub struct MotorBank<E> {
    config: MotorConfig,
    escs: Vec<E, MAX_MOTORS>,
    motors: [Motor; MAX_MOTORS],
    lev_speed: u8,
    thr_speed: u8,
}

impl<E: EscOutput> MotorBank<E> {
    /// Create the bank and hold every ESC at neutral
    pub fn new(config: MotorConfig, escs: impl IntoIterator<Item = E>) -> Self {
        let mut bank = Self {
            config,
            escs: Vec::new(),
            motors: [Motor::default(); MAX_MOTORS],
            lev_speed: 0,
            thr_speed: 0,
        };
        for esc in escs.into_iter().take(config.count as usize) {
            let _ = bank.escs.push(esc);
        }
        let neutral = bank.pulse_for(0);
        for (motor, esc) in bank.motors.iter_mut().zip(bank.escs.iter_mut()) {
            motor.attached = true;
            esc.write_pulse_us(neutral);
        }
        bank
    }

    /// Pulse width for a speed percentage
    ///
    /// 0 % is the neutral pulse. Any other speed maps linearly onto the
    /// range starting one dead band above neutral.
    pub fn pulse_for(&self, speed: u8) -> u16 {
        let c = &self.config;
        if speed == 0 {
            return c.pulse_min_us;
        }
        let speed = speed.min(MAX_SPEED) as u32;
        let low = (c.pulse_min_us + c.dead_band_us) as u32;
        let span = c.pulse_max_us as u32 - low;
        (low + speed * span / MAX_SPEED as u32) as u16
    }

    /// Record a speed and write it to the ESC
    ///
    /// No-op if `index` has no ESC attached.
    pub fn set_speed(&mut self, index: usize, speed: u8) {
        let speed = speed.min(MAX_SPEED);
        let pulse = self.pulse_for(speed);
        let Some(esc) = self.escs.get_mut(index) else {
            return;
        };
        self.motors[index].speed = speed;
        esc.write_pulse_us(pulse);
    }

    /// Start one motor at `speed`
    pub fn start(&mut self, index: usize, speed: u8) {
        if !self.is_attached(index) {
            return;
        }
        self.motors[index].running = true;
        self.set_speed(index, speed);
    }

    /// Stop one motor
    pub fn stop(&mut self, index: usize) {
        if !self.is_attached(index) {
            return;
        }
        self.motors[index].running = false;
        self.set_speed(index, 0);
    }

    /// Change the speed of one motor; only a running motor is driven
    pub fn retune(&mut self, index: usize, speed: u8) {
        if !self.is_attached(index) {
            return;
        }
        if self.motors[index].running {
            self.set_speed(index, speed);
        } else {
            self.motors[index].speed = speed.min(MAX_SPEED);
        }
    }

    /// Start every motor of a group at `speed`
    pub fn set_group(&mut self, group: Group, speed: u8) {
        let speed = speed.min(MAX_SPEED);
        *self.group_speed_mut(group) = speed;
        for i in self.range(group).indices() {
            self.start(i, speed);
        }
    }

    /// Change the speed of the running motors of a group
    pub fn retune_group(&mut self, group: Group, speed: u8) {
        let speed = speed.min(MAX_SPEED);
        *self.group_speed_mut(group) = speed;
        for i in self.range(group).indices() {
            if self.motors[i].running {
                self.set_speed(i, speed);
            }
        }
    }

    /// Stop every motor of a group
    pub fn stop_group(&mut self, group: Group) {
        *self.group_speed_mut(group) = 0;
        for i in self.range(group).indices() {
            self.stop(i);
        }
    }

    /// Stop every motor and clear the group speeds
    ///
    /// Motors already stopped are not written again.
    pub fn stop_all(&mut self) {
        for i in 0..self.escs.len() {
            let m = self.motors[i];
            if m.running || m.speed != 0 {
                self.stop(i);
            }
        }
        self.lev_speed = 0;
        self.thr_speed = 0;
    }

    pub fn motor(&self, index: usize) -> Option<Motor> {
        self.motors.get(index).copied().filter(|m| m.attached)
    }

    pub fn is_attached(&self, index: usize) -> bool {
        index < self.escs.len()
    }

    pub fn len(&self) -> usize {
        self.escs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escs.is_empty()
    }

    pub fn running_count(&self) -> u8 {
        self.motors.iter().filter(|m| m.running).count() as u8
    }

    pub fn group_speed(&self, group: Group) -> u8 {
        match group {
            Group::Levitation => self.lev_speed,
            Group::Thrust => self.thr_speed,
        }
    }

    /// Per-motor state for status reports
    pub fn snapshot(&self) -> Vec<MotorSnapshot, MAX_MOTORS> {
        self.motors
            .iter()
            .take(self.escs.len())
            .map(|m| MotorSnapshot {
                running: m.running,
                speed: m.speed,
            })
            .collect()
    }

    fn range(&self, group: Group) -> GroupRange {
        match group {
            Group::Levitation => self.config.levitation,
            Group::Thrust => self.config.thrust,
        }
    }

    fn group_speed_mut(&mut self, group: Group) -> &mut u8 {
        match group {
            Group::Levitation => &mut self.lev_speed,
            Group::Thrust => &mut self.thr_speed,
        }
    }
}
