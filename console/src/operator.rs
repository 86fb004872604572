//! Operator input parsing
//!
//! The console stands in for the flight window: colon-prefixed lines are
//! buttons, keys and sliders; any other line is free-form drone text.
//!
//! | Line | Action |
//! |------|--------|
//! | `:connect` `:takeoff` `:land` `:battery` `:end` | buttons |
//! | `:w` `:a` `:s` `:d` | forward / left / back / right |
//! | `:up` `:down` | altitude |
//! | `:left` `:right` | ccw / cw |
//! | `:space` `:stop` | neutral |
//! | `:=` `:-` | speed up / down |
//! | `:speed N` `:rotation N` | sliders |
//! | `:help` | key reference |

use ocufly_link::InputEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAction {
    Connect,
    Takeoff,
    Land,
    Battery,
    End,
    Input(InputEvent),
    Help,
    /// Forwarded to the session verbatim
    Text(String),
    /// Colon line that matched nothing
    Unknown(String),
}

pub const HELP: &str = "\
WASD controls (:w :a :s :d), :up/:down altitude, :left/:right yaw, :space stop
:= / :- change speed, :speed N, :rotation N
:connect :takeoff :land :battery :end, anything else is sent as typed, quit exits";

pub fn parse_line(line: &str) -> OperatorAction {
    let Some(binding) = line.strip_prefix(':') else {
        return OperatorAction::Text(line.to_string());
    };

    let mut words = binding.split_whitespace();
    let key = words.next().unwrap_or_default();
    let value = words.next();

    match (key, value) {
        ("connect", None) => OperatorAction::Connect,
        ("takeoff", None) => OperatorAction::Takeoff,
        ("land", None) => OperatorAction::Land,
        ("battery", None) => OperatorAction::Battery,
        ("end", None) => OperatorAction::End,
        ("help", None) => OperatorAction::Help,
        ("w", None) => OperatorAction::Input(InputEvent::Forward),
        ("a", None) => OperatorAction::Input(InputEvent::Left),
        ("s", None) => OperatorAction::Input(InputEvent::Back),
        ("d", None) => OperatorAction::Input(InputEvent::Right),
        ("up", None) => OperatorAction::Input(InputEvent::Up),
        ("down", None) => OperatorAction::Input(InputEvent::Down),
        ("left", None) => OperatorAction::Input(InputEvent::RotateCounterClockwise),
        ("right", None) => OperatorAction::Input(InputEvent::RotateClockwise),
        ("space" | "stop", None) => OperatorAction::Input(InputEvent::Stop),
        ("=", None) => OperatorAction::Input(InputEvent::SpeedIncrease),
        ("-", None) => OperatorAction::Input(InputEvent::SpeedDecrease),
        ("speed", Some(v)) => match v.parse::<u16>() {
            Ok(v) => OperatorAction::Input(InputEvent::SetSpeed(v.min(100) as u8)),
            Err(_) => OperatorAction::Unknown(line.to_string()),
        },
        ("rotation", Some(v)) => match v.parse() {
            Ok(v) => OperatorAction::Input(InputEvent::SetRotation(v)),
            Err(_) => OperatorAction::Unknown(line.to_string()),
        },
        _ => OperatorAction::Unknown(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_key_bindings() {
        assert_eq!(parse_line(":w"), OperatorAction::Input(InputEvent::Forward));
        assert_eq!(parse_line(":a"), OperatorAction::Input(InputEvent::Left));
        assert_eq!(parse_line(":s"), OperatorAction::Input(InputEvent::Back));
        assert_eq!(parse_line(":d"), OperatorAction::Input(InputEvent::Right));
        assert_eq!(parse_line(":left"), OperatorAction::Input(InputEvent::RotateCounterClockwise));
        assert_eq!(parse_line(":right"), OperatorAction::Input(InputEvent::RotateClockwise));
        assert_eq!(parse_line(":space"), OperatorAction::Input(InputEvent::Stop));
        assert_eq!(parse_line(":="), OperatorAction::Input(InputEvent::SpeedIncrease));
        assert_eq!(parse_line(":-"), OperatorAction::Input(InputEvent::SpeedDecrease));
    }

    #[test]
    fn test_buttons_and_sliders() {
        assert_eq!(parse_line(":connect"), OperatorAction::Connect);
        assert_eq!(parse_line(":battery"), OperatorAction::Battery);
        assert_eq!(parse_line(":end"), OperatorAction::End);
        assert_eq!(parse_line(":speed 70"), OperatorAction::Input(InputEvent::SetSpeed(70)));
        assert_eq!(parse_line(":speed 900"), OperatorAction::Input(InputEvent::SetSpeed(100)));
        assert_eq!(parse_line(":rotation 270"), OperatorAction::Input(InputEvent::SetRotation(270)));
        assert_eq!(parse_line(":speed fast"), OperatorAction::Unknown(":speed fast".into()));
    }

    #[test]
    fn test_plain_lines_are_free_text() {
        assert_eq!(parse_line("battery?"), OperatorAction::Text("battery?".into()));
        assert_eq!(parse_line("quit now"), OperatorAction::Text("quit now".into()));
        assert_eq!(parse_line(":fly"), OperatorAction::Unknown(":fly".into()));
    }
}
