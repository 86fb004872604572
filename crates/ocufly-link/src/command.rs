//! Wire command vocabulary
//!
//! One ASCII command per datagram, no length prefix, case-sensitive:
//! `command`, `takeoff`, `land`, `battery?`, `rc a b c d`, `up n`, `down n`,
//! `cw n`, `ccw n`. Free-form operator text travels as [`Command::Raw`] and
//! is transmitted byte for byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis limit for `rc` values
pub const RC_LIMIT: i8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Enter SDK control mode (`command`)
    Connect,
    Takeoff,
    Land,
    /// `battery?`
    BatteryQuery,
    /// Instantaneous velocity vector, each axis in [-100, 100]
    Rc {
        roll: i8,
        pitch: i8,
        throttle: i8,
        yaw: i8,
    },
    Up(u8),
    Down(u8),
    Clockwise(u16),
    CounterClockwise(u16),
    /// Operator text, sent verbatim
    Raw(String),
}

impl Command {
    /// Neutral `rc 0 0 0 0`, the only way streamed motion stops
    pub const STOP: Command = Command::Rc {
        roll: 0,
        pitch: 0,
        throttle: 0,
        yaw: 0,
    };

    pub fn rc(roll: i8, pitch: i8, throttle: i8, yaw: i8) -> Self {
        let clamp = |v: i8| v.clamp(-RC_LIMIT, RC_LIMIT);
        Command::Rc {
            roll: clamp(roll),
            pitch: clamp(pitch),
            throttle: clamp(throttle),
            yaw: clamp(yaw),
        }
    }

    /// Recognize operator text.
    ///
    /// Text whose canonical encoding is exactly the input maps onto a known
    /// command; anything else becomes [`Command::Raw`]. Either way the
    /// encoded bytes equal the input.
    pub fn from_text(text: &str) -> Self {
        match parse_known(text) {
            Some(command) if command.to_string() == text => command,
            _ => Command::Raw(text.to_string()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Command::Rc { .. }
                | Command::Up(_)
                | Command::Down(_)
                | Command::Clockwise(_)
                | Command::CounterClockwise(_)
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => f.write_str("command"),
            Command::Takeoff => f.write_str("takeoff"),
            Command::Land => f.write_str("land"),
            Command::BatteryQuery => f.write_str("battery?"),
            Command::Rc {
                roll,
                pitch,
                throttle,
                yaw,
            } => write!(f, "rc {} {} {} {}", roll, pitch, throttle, yaw),
            Command::Up(n) => write!(f, "up {}", n),
            Command::Down(n) => write!(f, "down {}", n),
            Command::Clockwise(n) => write!(f, "cw {}", n),
            Command::CounterClockwise(n) => write!(f, "ccw {}", n),
            Command::Raw(text) => f.write_str(text),
        }
    }
}

fn parse_known(text: &str) -> Option<Command> {
    let mut parts = text.split(' ');
    let keyword = parts.next()?;
    let args: Vec<&str> = parts.collect();

    let command = match (keyword, args.as_slice()) {
        ("command", []) => Command::Connect,
        ("takeoff", []) => Command::Takeoff,
        ("land", []) => Command::Land,
        ("battery?", []) => Command::BatteryQuery,
        ("rc", [roll, pitch, throttle, yaw]) => {
            let axis = |s: &&str| s.parse::<i8>().ok().filter(|v| (-RC_LIMIT..=RC_LIMIT).contains(v));
            Command::Rc {
                roll: axis(roll)?,
                pitch: axis(pitch)?,
                throttle: axis(throttle)?,
                yaw: axis(yaw)?,
            }
        }
        ("up", [n]) => Command::Up(n.parse().ok()?),
        ("down", [n]) => Command::Down(n.parse().ok()?),
        ("cw", [n]) => Command::Clockwise(n.parse().ok()?),
        ("ccw", [n]) => Command::CounterClockwise(n.parse().ok()?),
        _ => return None,
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_encoding() {
        assert_eq!(Command::Connect.to_string(), "command");
        assert_eq!(Command::Takeoff.to_string(), "takeoff");
        assert_eq!(Command::Land.to_string(), "land");
        assert_eq!(Command::BatteryQuery.to_string(), "battery?");
        assert_eq!(Command::rc(-30, 0, 0, 0).to_string(), "rc -30 0 0 0");
        assert_eq!(Command::STOP.to_string(), "rc 0 0 0 0");
        assert_eq!(Command::Up(40).to_string(), "up 40");
        assert_eq!(Command::Down(40).to_string(), "down 40");
        assert_eq!(Command::Clockwise(90).to_string(), "cw 90");
        assert_eq!(Command::CounterClockwise(200).to_string(), "ccw 200");
        assert_eq!(Command::Takeoff.encode(), b"takeoff".to_vec());
    }

    #[test]
    fn test_rc_axes_clamped() {
        assert_eq!(Command::rc(127, -128, 0, 5).to_string(), "rc 100 -100 0 5");
    }

    #[test]
    fn test_from_text_recognizes_canonical_forms() {
        assert_eq!(Command::from_text("takeoff"), Command::Takeoff);
        assert_eq!(Command::from_text("battery?"), Command::BatteryQuery);
        assert_eq!(Command::from_text("rc 0 30 0 0"), Command::rc(0, 30, 0, 0));
        assert_eq!(Command::from_text("cw 45"), Command::Clockwise(45));
    }

    #[test]
    fn test_from_text_keeps_everything_else_verbatim() {
        for text in ["rc 0  30 0 0", "Takeoff", "flip l", "rc 0 300 0 0", "up +20", "end", " land"] {
            let command = Command::from_text(text);
            assert_eq!(command, Command::Raw(text.to_string()), "{:?}", text);
            assert_eq!(command.to_string(), text);
        }
    }

    #[test]
    fn test_motion_classification() {
        assert!(Command::STOP.is_motion());
        assert!(Command::CounterClockwise(30).is_motion());
        assert!(!Command::Land.is_motion());
        assert!(!Command::Raw("rc 0 0 0 0".into()).is_motion());
    }
}
