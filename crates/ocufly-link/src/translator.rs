//! Control Translator
//!
//! Maps operator input events onto wire commands. The translator owns the
//! two operator magnitudes:
//! - speed (0-100, steps of 10) substituted into `rc`, `up` and `down`
//! - rotation (1-360 degrees) substituted into `cw` and `ccw`
//!
//! Rotation carries a quirk of the original controller that is kept as is:
//! after every rotation command, a magnitude above 180 snaps back to the
//! default yaw.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::config::{DEFAULT_SPEED, DEFAULT_YAW};

/// Speed magnitude step for increase/decrease events
pub const SPEED_STEP: u8 = 10;

/// Rotation magnitudes above this reset to the default yaw
pub const ROTATION_RESET_ABOVE: u16 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8")]
pub struct SpeedSetting(u8);

impl SpeedSetting {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;

    /// Clamp into [0, 100]
    pub fn new(value: u8) -> Self {
        SpeedSetting(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn increased(self) -> Self {
        if self.0 > Self::MAX - SPEED_STEP {
            SpeedSetting(Self::MAX)
        } else {
            SpeedSetting(self.0 + SPEED_STEP)
        }
    }

    pub fn decreased(self) -> Self {
        if self.0 < SPEED_STEP {
            SpeedSetting(Self::MIN)
        } else {
            SpeedSetting(self.0 - SPEED_STEP)
        }
    }

    /// Signed `rc` axis value
    fn axis(self, negative: bool) -> i8 {
        // value() <= 100 always fits an i8
        let magnitude = self.0 as i8;
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl From<u8> for SpeedSetting {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl Default for SpeedSetting {
    fn default() -> Self {
        SpeedSetting(DEFAULT_SPEED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u16")]
pub struct RotationMagnitude(u16);

impl RotationMagnitude {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 360;

    /// Clamp into [1, 360]
    pub fn new(degrees: u16) -> Self {
        RotationMagnitude(degrees.clamp(Self::MIN, Self::MAX))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }
}

impl From<u16> for RotationMagnitude {
    fn from(degrees: u16) -> Self {
        Self::new(degrees)
    }
}

impl Default for RotationMagnitude {
    fn default() -> Self {
        RotationMagnitude(DEFAULT_YAW)
    }
}

/// Operator input events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Forward,
    Back,
    Left,
    Right,
    /// Key released or explicit neutral
    Stop,
    Up,
    Down,
    RotateClockwise,
    RotateCounterClockwise,
    SpeedIncrease,
    SpeedDecrease,
    /// Speed slider moved
    SetSpeed(u8),
    /// Rotation slider moved
    SetRotation(u16),
}

#[derive(Debug, Clone, Default)]
pub struct ControlTranslator {
    speed: SpeedSetting,
    rotation: RotationMagnitude,
    default_yaw: RotationMagnitude,
}

impl ControlTranslator {
    pub fn new(speed: SpeedSetting, rotation: RotationMagnitude) -> Self {
        Self {
            speed,
            rotation,
            default_yaw: RotationMagnitude::default(),
        }
    }

    /// Starting magnitudes, with `default_yaw` also used as the reset target
    pub fn with_defaults(default_speed: u8, default_yaw: u16) -> Self {
        let yaw = RotationMagnitude::new(default_yaw);
        Self {
            speed: SpeedSetting::new(default_speed),
            rotation: yaw,
            default_yaw: yaw,
        }
    }

    pub fn speed(&self) -> SpeedSetting {
        self.speed
    }

    pub fn rotation(&self) -> RotationMagnitude {
        self.rotation
    }

    /// Translate one event.
    ///
    /// Returns the command to transmit, or `None` for events that only
    /// change local magnitudes.
    pub fn translate(&mut self, event: InputEvent) -> Option<Command> {
        let speed = self.speed;
        let command = match event {
            InputEvent::Forward => Command::rc(0, speed.axis(false), 0, 0),
            InputEvent::Back => Command::rc(0, speed.axis(true), 0, 0),
            InputEvent::Left => Command::rc(speed.axis(true), 0, 0, 0),
            InputEvent::Right => Command::rc(speed.axis(false), 0, 0, 0),
            InputEvent::Stop => Command::STOP,
            InputEvent::Up => Command::Up(speed.value()),
            InputEvent::Down => Command::Down(speed.value()),
            InputEvent::RotateClockwise => {
                let command = Command::Clockwise(self.rotation.degrees());
                self.apply_rotation_reset();
                command
            }
            InputEvent::RotateCounterClockwise => {
                let command = Command::CounterClockwise(self.rotation.degrees());
                self.apply_rotation_reset();
                command
            }
            InputEvent::SpeedIncrease => {
                self.speed = speed.increased();
                return None;
            }
            InputEvent::SpeedDecrease => {
                self.speed = speed.decreased();
                return None;
            }
            InputEvent::SetSpeed(value) => {
                self.speed = SpeedSetting::new(value);
                return None;
            }
            InputEvent::SetRotation(degrees) => {
                self.rotation = RotationMagnitude::new(degrees);
                return None;
            }
        };
        Some(command)
    }

    fn apply_rotation_reset(&mut self) {
        if self.rotation.degrees() > ROTATION_RESET_ABOVE {
            tracing::debug!(
                "Rotation {} above {}, resetting to {}",
                self.rotation.degrees(),
                ROTATION_RESET_ABOVE,
                self.default_yaw.degrees()
            );
            self.rotation = self.default_yaw;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(speed: u8, rotation: u16) -> ControlTranslator {
        ControlTranslator::new(SpeedSetting::new(speed), RotationMagnitude::new(rotation))
    }

    fn wire(translator: &mut ControlTranslator, event: InputEvent) -> Option<String> {
        translator.translate(event).map(|c| c.to_string())
    }

    #[test]
    fn test_defaults() {
        let t = ControlTranslator::default();
        assert_eq!(t.speed().value(), 30);
        assert_eq!(t.rotation().degrees(), 30);
    }

    #[test]
    fn test_stop_is_neutral_rc() {
        let mut t = translator(70, 30);
        assert_eq!(wire(&mut t, InputEvent::Stop).as_deref(), Some("rc 0 0 0 0"));
    }

    #[test]
    fn test_altitude_uses_speed() {
        let mut t = translator(40, 30);
        assert_eq!(wire(&mut t, InputEvent::Up).as_deref(), Some("up 40"));
        assert_eq!(wire(&mut t, InputEvent::Down).as_deref(), Some("down 40"));
    }

    #[test]
    fn test_speed_clamps_at_bounds() {
        let mut t = translator(95, 30);
        assert_eq!(t.translate(InputEvent::SpeedIncrease), None);
        assert_eq!(t.speed().value(), 100);

        let mut t = translator(5, 30);
        assert_eq!(t.translate(InputEvent::SpeedDecrease), None);
        assert_eq!(t.speed().value(), 0);

        let mut t = translator(30, 30);
        t.translate(InputEvent::SpeedIncrease);
        assert_eq!(t.speed().value(), 40);
        t.translate(InputEvent::SpeedDecrease);
        t.translate(InputEvent::SpeedDecrease);
        assert_eq!(t.speed().value(), 20);
    }

    #[test]
    fn test_speed_at_exact_bounds() {
        let mut t = translator(90, 30);
        t.translate(InputEvent::SpeedIncrease);
        assert_eq!(t.speed().value(), 100);

        let mut t = translator(10, 30);
        t.translate(InputEvent::SpeedDecrease);
        assert_eq!(t.speed().value(), 0);
    }

    #[test]
    fn test_rotation_reset_above_180() {
        let mut t = translator(30, 200);
        assert_eq!(wire(&mut t, InputEvent::RotateCounterClockwise).as_deref(), Some("ccw 200"));
        assert_eq!(t.rotation().degrees(), 30);

        assert_eq!(wire(&mut t, InputEvent::RotateCounterClockwise).as_deref(), Some("ccw 30"));
        assert_eq!(t.rotation().degrees(), 30);
    }

    #[test]
    fn test_rotation_reset_fires_every_time_above_180() {
        let mut t = translator(30, 181);
        assert_eq!(wire(&mut t, InputEvent::RotateClockwise).as_deref(), Some("cw 181"));
        assert_eq!(t.rotation().degrees(), 30);

        t.translate(InputEvent::SetRotation(360));
        assert_eq!(wire(&mut t, InputEvent::RotateClockwise).as_deref(), Some("cw 360"));
        assert_eq!(t.rotation().degrees(), 30);

        t.translate(InputEvent::SetRotation(180));
        assert_eq!(wire(&mut t, InputEvent::RotateClockwise).as_deref(), Some("cw 180"));
        assert_eq!(t.rotation().degrees(), 180);
    }

    #[test]
    fn test_reset_uses_configured_default_yaw() {
        let mut t = ControlTranslator::with_defaults(30, 45);
        t.translate(InputEvent::SetRotation(270));
        t.translate(InputEvent::RotateClockwise);
        assert_eq!(t.rotation().degrees(), 45);
    }

    #[test]
    fn test_deserialized_magnitudes_clamped() {
        let speed: SpeedSetting = serde_json::from_str("200").unwrap();
        assert_eq!(speed.value(), 100);
        let rotation: RotationMagnitude = serde_json::from_str("0").unwrap();
        assert_eq!(rotation.degrees(), 1);

        let mut t = ControlTranslator::new(speed, rotation);
        assert_eq!(wire(&mut t, InputEvent::Back).as_deref(), Some("rc 0 -100 0 0"));
    }

    #[test]
    fn test_sliders_clamp() {
        let mut t = translator(30, 30);
        assert_eq!(t.translate(InputEvent::SetSpeed(250)), None);
        assert_eq!(t.speed().value(), 100);
        assert_eq!(t.translate(InputEvent::SetRotation(0)), None);
        assert_eq!(t.rotation().degrees(), 1);
        t.translate(InputEvent::SetRotation(1000));
        assert_eq!(t.rotation().degrees(), 360);
    }
}

// ============================================================================
// Property-based Tests
// ============================================================================
