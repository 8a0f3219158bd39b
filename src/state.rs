use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ValidationError;

pub const DEFAULT_LED_COUNT: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Breathe,
    Strobe,
    Single,
    Marquee,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Normal => "normal (solid)",
            Mode::Breathe => "breathe",
            Mode::Strobe => "strobe",
            Mode::Single => "single led",
            Mode::Marquee => "marquee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// Parses `r,g,b` with every channel in 0..=255.
impl FromStr for Rgb {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(ValidationError::MalformedColor(s.to_string()));
        };

        Ok(Self {
            r: channel('r', r)?,
            g: channel('g', g)?,
            b: channel('b', b)?,
        })
    }
}

fn channel(name: char, raw: &str) -> Result<u8, ValidationError> {
    let value = parse_number(raw)?;
    u8::try_from(value).map_err(|_| ValidationError::Channel {
        channel: name,
        value,
    })
}

pub fn parse_number(raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::NotANumber(raw.to_string()))
}

/// The session record mutated by the command engine.
///
/// Fields are private so every change goes through a validating setter;
/// a rejected value leaves the previous one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    mode: Mode,
    percentage: u8,
    position: u8,
    color: Rgb,
    led_count: u8,
}

impl ControlState {
    pub fn new(led_count: u8) -> Self {
        Self {
            mode: Mode::Normal,
            percentage: 100,
            position: 1,
            color: Rgb::new(3, 4, 5),
            led_count,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn led_count(&self) -> u8 {
        self.led_count
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn set_percentage(&mut self, value: i64) -> Result<u8, ValidationError> {
        let percentage = match u8::try_from(value) {
            Ok(p @ 1..=100) => p,
            _ => return Err(ValidationError::Percentage(value)),
        };
        self.percentage = percentage;
        Ok(percentage)
    }

    /// Accepts `1 <= value < led_count`.
    pub fn set_position(&mut self, value: i64) -> Result<u8, ValidationError> {
        let max = i64::from(self.led_count) - 1;
        if value < 1 || value > max {
            return Err(ValidationError::Position { value, max });
        }
        // bounded by led_count above, so this always fits
        let position = u8::try_from(value).map_err(|_| ValidationError::Position { value, max })?;
        self.position = position;
        Ok(position)
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_power_on_session() {
        let state = ControlState::new(DEFAULT_LED_COUNT);
        assert_eq!(state.mode(), Mode::Normal);
        assert_eq!(state.percentage(), 100);
        assert_eq!(state.position(), 1);
        assert_eq!(state.color(), Rgb::new(3, 4, 5));
        assert_eq!(state.led_count(), 30);
    }

    #[test]
    fn test_percentage_bounds() {
        let mut state = ControlState::new(30);
        assert_eq!(state.set_percentage(1), Ok(1));
        assert_eq!(state.set_percentage(100), Ok(100));
        assert_eq!(state.set_percentage(0), Err(ValidationError::Percentage(0)));
        assert_eq!(state.set_percentage(101), Err(ValidationError::Percentage(101)));
        assert_eq!(state.set_percentage(-5), Err(ValidationError::Percentage(-5)));
        assert_eq!(state.percentage(), 100);
    }

    #[test]
    fn test_position_rejects_zero_and_led_count() {
        let mut state = ControlState::new(30);
        assert!(state.set_position(0).is_err());
        assert_eq!(
            state.set_position(30),
            Err(ValidationError::Position { value: 30, max: 29 })
        );
        assert_eq!(state.position(), 1);

        assert_eq!(state.set_position(29), Ok(29));
        assert_eq!(state.position(), 29);
    }

    #[test]
    fn test_position_large_value_does_not_wrap() {
        let mut state = ControlState::new(255);
        assert!(state.set_position(256 + 5).is_err());
        assert_eq!(state.position(), 1);
    }

    #[test]
    fn test_rgb_parse() {
        assert_eq!("255,0,0".parse::<Rgb>(), Ok(Rgb::new(255, 0, 0)));
        assert_eq!(" 1, 2 ,3".parse::<Rgb>(), Ok(Rgb::new(1, 2, 3)));
    }

    #[test]
    fn test_rgb_parse_rejects_bad_input() {
        assert_eq!(
            "256,0,0".parse::<Rgb>(),
            Err(ValidationError::Channel {
                channel: 'r',
                value: 256
            })
        );
        assert_eq!(
            "0,-1,0".parse::<Rgb>(),
            Err(ValidationError::Channel {
                channel: 'g',
                value: -1
            })
        );
        assert!(matches!(
            "1,2".parse::<Rgb>(),
            Err(ValidationError::MalformedColor(_))
        ));
        assert!(matches!(
            "1,2,x".parse::<Rgb>(),
            Err(ValidationError::NotANumber(_))
        ));
    }

    #[test]
    fn test_rgb_display_round_trips_through_parse() {
        let color = Rgb::new(12, 200, 7);
        assert_eq!(color.to_string().parse::<Rgb>(), Ok(color));
    }
}
