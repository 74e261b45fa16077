//! Inbound command tokenizer
//!
//! Commands are colon-delimited ASCII tokens, e.g. `ARM`, `MOTOR:3:SPEED:40`
//! or `LEV_GROUP:START`. A line is parsed once into a [`Command`] and then
//! dispatched by pattern match.

/// Maximum speed percentage
pub const MAX_SPEED: u8 = 100;

/// Named motor group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Group {
    /// Levitation bank (`LEV_GROUP`)
    Levitation,
    /// Thrust bank (`THR_GROUP`)
    Thrust,
}

impl Group {
    /// Protocol prefix for this group
    pub fn prefix(&self) -> &'static str {
        match self {
            Group::Levitation => "LEV",
            Group::Thrust => "THR",
        }
    }
}

/// Action applied to a single motor or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorAction {
    /// Start at the given speed, or the configured default when absent
    Start(Option<u8>),
    /// Stop
    Stop,
    /// Change the speed of running motors
    Speed(u8),
}

/// A decoded host command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Ping,
    Arm,
    Disarm,
    Status,
    TempStatus,
    TempDual,
    TempRealtime,
    /// `TEMP_BYPASS_ON` / `TEMP_BYPASS_OFF`
    TempBypass(bool),
    ReflectorStatus,
    ReflectorReset,
    ReflectorCalibrate,
    /// `BRAKE_ON` / `BRAKE_OFF`
    Brake(bool),
    /// `RELAY_BRAKE_ON` / `RELAY_BRAKE_OFF`
    RelayBrake(bool),
    BuzzerOff,
    EmergencyStop,
    /// `MOTOR:<n>:...` with a 1-based motor number
    Motor { motor: u8, action: MotorAction },
    /// `LEV_GROUP:...` / `THR_GROUP:...`
    Group { group: Group, action: MotorAction },
}

/// Errors that can occur while parsing a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Line was empty
    Empty,
    /// First token is not a known command
    UnknownCommand,
    /// Motor/group action is not START, STOP or SPEED
    UnknownAction,
    /// A required argument is missing
    MissingArgument,
    /// An argument is not a valid number
    InvalidNumber,
    /// More tokens than the command accepts
    UnexpectedArgument,
}

impl ParseError {
    /// Reason token used in `ERROR:` lines
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::Empty => "Empty_command",
            ParseError::UnknownCommand => "Unknown_command",
            ParseError::UnknownAction => "Unknown_action",
            ParseError::MissingArgument => "Missing_argument",
            ParseError::InvalidNumber => "Invalid_number",
            ParseError::UnexpectedArgument => "Unexpected_argument",
        }
    }
}

impl Command {
    /// Parse one trimmed line into a command
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut tokens = line.split(':');
        // split always yields at least one token
        let head = tokens.next().unwrap_or("");

        let command = match head {
            "MOTOR" => {
                let motor = parse_number(tokens.next().ok_or(ParseError::MissingArgument)?)?;
                let motor = u8::try_from(motor).map_err(|_| ParseError::InvalidNumber)?;
                let action = parse_action(&mut tokens)?;
                Command::Motor { motor, action }
            }
            "LEV_GROUP" => Command::Group {
                group: Group::Levitation,
                action: parse_action(&mut tokens)?,
            },
            "THR_GROUP" => Command::Group {
                group: Group::Thrust,
                action: parse_action(&mut tokens)?,
            },
            simple => parse_simple(simple)?,
        };

        if tokens.next().is_some() {
            return Err(ParseError::UnexpectedArgument);
        }

        Ok(command)
    }
}

/// Parse a command with no arguments
fn parse_simple(token: &str) -> Result<Command, ParseError> {
    let command = match token {
        "PING" => Command::Ping,
        "ARM" => Command::Arm,
        "DISARM" => Command::Disarm,
        "STATUS" => Command::Status,
        "TEMP_STATUS" => Command::TempStatus,
        "TEMP_DUAL" => Command::TempDual,
        "TEMP_REALTIME" => Command::TempRealtime,
        "TEMP_BYPASS_ON" => Command::TempBypass(true),
        "TEMP_BYPASS_OFF" => Command::TempBypass(false),
        "REFLECTOR_STATUS" => Command::ReflectorStatus,
        "REFLECTOR_RESET" => Command::ReflectorReset,
        "REFLECTOR_CALIBRATE" => Command::ReflectorCalibrate,
        "BRAKE_ON" => Command::Brake(true),
        "BRAKE_OFF" => Command::Brake(false),
        "RELAY_BRAKE_ON" => Command::RelayBrake(true),
        "RELAY_BRAKE_OFF" => Command::RelayBrake(false),
        "BUZZER_OFF" => Command::BuzzerOff,
        "EMERGENCY_STOP" => Command::EmergencyStop,
        _ => return Err(ParseError::UnknownCommand),
    };
    Ok(command)
}

/// Parse `START[:<speed>]`, `STOP` or `SPEED:<speed>`
fn parse_action<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<MotorAction, ParseError> {
    let action = tokens.next().ok_or(ParseError::MissingArgument)?;
    match action {
        "START" => {
            let speed = tokens.next().map(parse_speed).transpose()?;
            Ok(MotorAction::Start(speed))
        }
        "STOP" => Ok(MotorAction::Stop),
        "SPEED" => {
            let speed = parse_speed(tokens.next().ok_or(ParseError::MissingArgument)?)?;
            Ok(MotorAction::Speed(speed))
        }
        _ => Err(ParseError::UnknownAction),
    }
}

/// Parse a speed percentage, saturating at [`MAX_SPEED`]
fn parse_speed(token: &str) -> Result<u8, ParseError> {
    let value = parse_number(token)?;
    Ok(value.min(MAX_SPEED as u16) as u8)
}

fn parse_number(token: &str) -> Result<u16, ParseError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ParseError::MissingArgument);
    }
    token.parse().map_err(|_| ParseError::InvalidNumber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("PING"), Ok(Command::Ping));
        assert_eq!(Command::parse("ARM"), Ok(Command::Arm));
        assert_eq!(Command::parse("RELAY_BRAKE_ON"), Ok(Command::RelayBrake(true)));
        assert_eq!(Command::parse("BRAKE_OFF"), Ok(Command::Brake(false)));
        assert_eq!(Command::parse("TEMP_BYPASS_ON"), Ok(Command::TempBypass(true)));
        assert_eq!(Command::parse("REFLECTOR_RESET"), Ok(Command::ReflectorReset));
        assert_eq!(Command::parse("EMERGENCY_STOP"), Ok(Command::EmergencyStop));
    }

    #[test]
    fn test_motor_commands() {
        assert_eq!(
            Command::parse("MOTOR:1:START:50"),
            Ok(Command::Motor {
                motor: 1,
                action: MotorAction::Start(Some(50))
            })
        );
        assert_eq!(
            Command::parse("MOTOR:6:START"),
            Ok(Command::Motor {
                motor: 6,
                action: MotorAction::Start(None)
            })
        );
        assert_eq!(
            Command::parse("MOTOR:3:STOP"),
            Ok(Command::Motor {
                motor: 3,
                action: MotorAction::Stop
            })
        );
        assert_eq!(
            Command::parse("MOTOR:2:SPEED:75"),
            Ok(Command::Motor {
                motor: 2,
                action: MotorAction::Speed(75)
            })
        );
    }

    #[test]
    fn test_group_commands() {
        assert_eq!(
            Command::parse("LEV_GROUP:START:30"),
            Ok(Command::Group {
                group: Group::Levitation,
                action: MotorAction::Start(Some(30))
            })
        );
        assert_eq!(
            Command::parse("THR_GROUP:STOP"),
            Ok(Command::Group {
                group: Group::Thrust,
                action: MotorAction::Stop
            })
        );
    }

    #[test]
    fn test_speed_saturates() {
        assert_eq!(
            Command::parse("MOTOR:1:SPEED:250"),
            Ok(Command::Motor {
                motor: 1,
                action: MotorAction::Speed(100)
            })
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(Command::parse(""), Err(ParseError::Empty));
        assert_eq!(Command::parse("LAUNCH"), Err(ParseError::UnknownCommand));
        assert_eq!(Command::parse("MOTOR"), Err(ParseError::MissingArgument));
        assert_eq!(Command::parse("MOTOR:x:START"), Err(ParseError::InvalidNumber));
        assert_eq!(Command::parse("MOTOR:1:SPIN"), Err(ParseError::UnknownAction));
        assert_eq!(Command::parse("MOTOR:1:SPEED"), Err(ParseError::MissingArgument));
        assert_eq!(Command::parse("MOTOR:1:SPEED:-5"), Err(ParseError::InvalidNumber));
        assert_eq!(Command::parse("MOTOR:1:STOP:9"), Err(ParseError::UnexpectedArgument));
        assert_eq!(Command::parse("ARM:NOW"), Err(ParseError::UnexpectedArgument));
        assert_eq!(Command::parse("arm"), Err(ParseError::UnknownCommand));
    }

    proptest! {
        #[test]
        fn parse_never_panics(line in "[ -~]{0,64}") {
            let _ = Command::parse(&line);
        }

        #[test]
        fn parsed_speeds_are_bounded(n in 0u16..=u16::MAX) {
            let mut buf = heapless::String::<32>::new();
            core::fmt::Write::write_fmt(&mut buf, format_args!("MOTOR:1:SPEED:{}", n)).unwrap();
            match Command::parse(&buf) {
                Ok(Command::Motor { action: MotorAction::Speed(s), .. }) => prop_assert!(s <= MAX_SPEED),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
