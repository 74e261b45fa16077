//! Host command dispatch

use spectraloop_protocol::{
    Command, Group, Line, MotorAction, Refusal, Response, StopCause, MAX_SPEED,
};

use super::{Controller, Outbox};
use crate::safety::{InterlockError, InterlockEvent};
use crate::thermal::ThermalEvents;
use crate::traits::Board;

impl<B: Board> Controller<B> {
    /// Handle one line from the host
    ///
    /// Every line is acknowledged first, echoing the fused temperature and
    /// the reflector count. A line that does not parse is answered with an
    /// `ERROR:` line and changes nothing.
    pub fn handle_line(&mut self, line: &Line, now_ms: u32, outbox: &mut impl Outbox) {
        self.last_command_ms = Some(now_ms);
        outbox.send(Response::Ack {
            command: line.clone(),
            temps: self.temps(),
            reflector: self.reflector_count(),
        });

        match Command::parse(line) {
            Ok(command) => self.dispatch(command, now_ms, outbox),
            Err(e) => outbox.send(Response::Malformed {
                reason: e.reason(),
                command: line.clone(),
            }),
        }
    }

    fn dispatch(&mut self, command: Command, now_ms: u32, outbox: &mut impl Outbox) {
        let reflector = self.reflector_count();
        match command {
            Command::Ping => outbox.send(Response::Pong),
            Command::Arm => {
                let view = self.thermal_view();
                match self.interlock.arm(&view) {
                    Ok(()) => outbox.send(Response::Armed { reflector }),
                    Err(e) => self.refuse(Refusal::Arm, e, outbox),
                }
            }
            Command::Disarm => {
                self.interlock.disarm(&mut self.motors);
                outbox.send(Response::Disarmed { reflector });
            }
            Command::Status => outbox.send(Response::Status(self.status_report())),
            Command::TempStatus => outbox.send(Response::TempStatus(self.thermal_report())),
            Command::TempDual => outbox.send(Response::TempDual(self.thermal_report())),
            Command::TempRealtime => outbox.send(Response::TempRealtime(self.thermal_report())),
            Command::TempBypass(engaged) => {
                let mut events = ThermalEvents::new();
                self.thermal.set_bypass(engaged, &mut events);
                self.forward(&events, outbox);
            }
            Command::ReflectorStatus => outbox.send(Response::ReflectorFull(self.reflector.report())),
            Command::ReflectorReset => {
                self.reflector.reset(now_ms);
                outbox.send(Response::ReflectorReset);
            }
            Command::ReflectorCalibrate => {
                self.reflector.start_calibration();
                let rc = self.reflector.config();
                outbox.send(Response::ReflectorCalibrationStarted {
                    samples: rc.calibration_samples,
                    interval_ms: rc.calibration_interval_ms,
                });
            }
            Command::Brake(engaged) => {
                self.interlock.set_brake(engaged, &mut self.motors);
                outbox.send(Response::Brake { engaged, reflector });
            }
            Command::RelayBrake(engaged) => {
                let view = self.thermal_view();
                match self
                    .interlock
                    .set_relay_brake(engaged, &view, &mut self.motors)
                {
                    Ok(()) => outbox.send(Response::RelayBrake { engaged, reflector }),
                    Err(e) => self.refuse(Refusal::RelayBrake, e, outbox),
                }
            }
            Command::BuzzerOff => match self.annunciator.silence(self.thermal.alarm()) {
                Ok(()) => outbox.send(Response::BuzzerOff),
                Err(_) => outbox.send(Response::Error("Cannot_turn_off_buzzer_during_alarm")),
            },
            Command::EmergencyStop => {
                self.interlock.emergency_stop(&mut self.motors);
                outbox.send(Response::EmergencyStop {
                    cause: StopCause::Operator,
                    temps: self.temps(),
                    reflector,
                });
            }
            Command::Motor { motor, action } => self.motor_command(motor, action, outbox),
            Command::Group { group, action } => self.group_command(group, action, outbox),
        }
    }

    fn motor_command(&mut self, motor: u8, action: MotorAction, outbox: &mut impl Outbox) {
        if motor == 0 || !self.motors.is_attached(motor as usize - 1) {
            outbox.send(Response::InvalidMotor(motor));
            return;
        }
        if !self.admit(action, outbox) {
            return;
        }

        let index = motor as usize - 1;
        let reflector = self.reflector_count();
        match action {
            MotorAction::Start(speed) => {
                let speed = self.start_speed(speed);
                self.motors.start(index, speed);
                outbox.send(Response::MotorStarted {
                    motor,
                    speed,
                    reflector,
                });
                outbox.send(Response::PostStart {
                    group: None,
                    temps: self.temps(),
                    reflector,
                });
            }
            MotorAction::Stop => {
                self.motors.stop(index);
                outbox.send(Response::MotorStopped { motor, reflector });
            }
            MotorAction::Speed(speed) => {
                self.motors.retune(index, speed);
                outbox.send(Response::MotorSpeed {
                    motor,
                    speed,
                    reflector,
                });
            }
        }
    }

    fn group_command(&mut self, group: Group, action: MotorAction, outbox: &mut impl Outbox) {
        if !self.admit(action, outbox) {
            return;
        }

        let reflector = self.reflector_count();
        match action {
            MotorAction::Start(speed) => {
                let speed = self.start_speed(speed);
                self.motors.set_group(group, speed);
                outbox.send(Response::GroupStarted {
                    group,
                    speed,
                    reflector,
                });
                outbox.send(Response::PostStart {
                    group: Some(group),
                    temps: self.temps(),
                    reflector,
                });
            }
            MotorAction::Stop => {
                self.motors.stop_group(group);
                outbox.send(Response::GroupStopped { group, reflector });
            }
            MotorAction::Speed(speed) => {
                self.motors.retune_group(group, speed);
                outbox.send(Response::GroupSpeed {
                    group,
                    speed,
                    reflector,
                });
            }
        }
    }

    /// Pass a motor action through the interlock
    ///
    /// `STOP` is the one motor action that skips the start gate: it is
    /// admitted whatever the arm, brake, relay or alarm state, so a stop
    /// is never refused. Anything that drives a motor needs the start
    /// gate, checked after the relay readback is reconciled.
    fn admit(&mut self, action: MotorAction, outbox: &mut impl Outbox) -> bool {
        if action == MotorAction::Stop {
            return true;
        }
        if let Some(event) = self.interlock.reconcile(&mut self.motors) {
            self.on_interlock_event(event, outbox);
        }
        match self.interlock.check_start(&self.thermal_view()) {
            Ok(()) => true,
            Err(e) => {
                self.refuse(Refusal::Start, e, outbox);
                false
            }
        }
    }

    fn start_speed(&self, speed: Option<u8>) -> u8 {
        speed
            .unwrap_or(self.config.motors.default_speed)
            .min(MAX_SPEED)
    }

    fn refuse(&self, action: Refusal, error: InterlockError, outbox: &mut impl Outbox) {
        let InterlockError::NotReady(reason) = error;
        outbox.send(Response::Refused {
            action,
            reason: reason.reason(),
            max_temp: self.thermal.fused().value,
            reflector: self.reflector_count(),
        });
    }

    pub(super) fn on_interlock_event(&mut self, event: InterlockEvent, outbox: &mut impl Outbox) {
        match event {
            InterlockEvent::RelayReasserted => outbox.send(Response::RelayReasserted),
            InterlockEvent::RelayFailed => outbox.send(Response::RelayFault {
                reflector: self.reflector_count(),
            }),
        }
    }
}
