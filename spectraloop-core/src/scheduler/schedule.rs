//! Periodic task table

use heapless::Vec;

use super::cadence::Cadence;
use crate::config::TimingConfig;

/// Number of periodic tasks
pub const TASK_COUNT: usize = 10;

/// Periodic control-loop tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// Sample the reflector channel
    Reflector,
    /// Collect finished conversions, evaluate the alarm, request new ones
    Temperature,
    /// Drop channels that stopped delivering
    HealthCheck,
    /// Re-probe disconnected channels
    Recovery,
    /// Advance the buzzer pattern
    Buzzer,
    TemperatureReport,
    ReflectorReport,
    Heartbeat,
    Performance,
    /// Refresh read-rate statistics
    Stats,
}

impl Task {
    /// All tasks in the order they run within one pass
    pub const ALL: [Task; TASK_COUNT] = [
        Task::Reflector,
        Task::Temperature,
        Task::HealthCheck,
        Task::Recovery,
        Task::Buzzer,
        Task::TemperatureReport,
        Task::ReflectorReport,
        Task::Heartbeat,
        Task::Performance,
        Task::Stats,
    ];

    fn period_ms(self, timing: &TimingConfig) -> u32 {
        match self {
            Task::Reflector => timing.reflector_ms,
            Task::Temperature => timing.temperature_ms,
            Task::HealthCheck => timing.health_check_ms,
            Task::Recovery => timing.recovery_ms,
            Task::Buzzer => timing.buzzer_ms,
            Task::TemperatureReport => timing.temperature_report_ms,
            Task::ReflectorReport => timing.reflector_report_ms,
            Task::Heartbeat => timing.heartbeat_ms,
            Task::Performance => timing.performance_ms,
            Task::Stats => timing.stats_ms,
        }
    }
}

/// Tasks due in one pass
pub type DueTasks = Vec<Task, TASK_COUNT>;

/// One cadence per task
#[derive(Debug, Clone)]
pub struct Schedule {
    cadences: [Cadence; TASK_COUNT],
}

impl Schedule {
    pub fn new(timing: &TimingConfig, now_ms: u32) -> Self {
        Self {
            cadences: Task::ALL.map(|t| Cadence::new(t.period_ms(timing), now_ms)),
        }
    }

    /// Collect the tasks whose period has elapsed, in run order
    pub fn poll(&mut self, now_ms: u32) -> DueTasks {
        let mut due = DueTasks::new();
        for (task, cadence) in Task::ALL.iter().zip(self.cadences.iter_mut()) {
            if cadence.due(now_ms) {
                // Capacity equals the task count
                let _ = due.push(*task);
            }
        }
        due
    }

    pub fn period_ms(&self, task: Task) -> u32 {
        self.cadences[task as usize].period_ms()
    }
}
