// src/commands.rs
//
// Register payloads understood by the strip controller. Every write is
// six bytes: [opcode, count_or_index, g, r, b, trailer].

use std::fmt;

use crate::state::{Mode, Rgb};

pub const REGISTER_ADDRESS: u16 = 9;
pub const REGISTER_COUNT: u16 = 3;
pub const PAYLOAD_LEN: usize = 6;

pub const OP_SOLID: u8 = 0x03;
pub const OP_BREATHE: u8 = 0x04;
pub const OP_STROBE: u8 = 0x05;
pub const OP_SINGLE: u8 = 0x06;

pub const TRAILER_SOLID: u8 = 0x00;
pub const BREATHE_SPEED: u8 = 0x05;
pub const STROBE_SPEED: u8 = 0x64;

/// Fixed LED count carried by the numbered presets.
pub const PRESET_COUNT: u8 = 0x64;
/// Channel level used by the numbered presets.
pub const PRESET_LEVEL: u8 = 0x25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload([u8; PAYLOAD_LEN]);

impl Payload {
    pub const fn from_bytes(bytes: [u8; PAYLOAD_LEN]) -> Self {
        Self(bytes)
    }

    /// The controller expects green before red.
    const fn build(opcode: u8, count_or_index: u8, color: Rgb, trailer: u8) -> Self {
        Self([opcode, count_or_index, color.g, color.r, color.b, trailer])
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.0
    }

    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    #[cfg(test)]
    pub fn index(&self) -> u8 {
        self.0[1]
    }

    /// Packs the bytes big-endian into the three holding registers.
    pub fn registers(&self) -> [u16; REGISTER_COUNT as usize] {
        let b = self.0;
        [
            u16::from_be_bytes([b[0], b[1]]),
            u16::from_be_bytes([b[2], b[3]]),
            u16::from_be_bytes([b[4], b[5]]),
        ]
    }

    pub fn with_index(mut self, index: u8) -> Self {
        self.0[1] = index;
        self
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b0, b1, b2, b3, b4, b5] = self.0;
        write!(f, "[{b0:02x} {b1:02x} {b2:02x} {b3:02x} {b4:02x} {b5:02x}]")
    }
}

/// Turns every LED off.
pub const ALL_OFF: Payload = Payload::from_bytes([OP_SOLID, PRESET_COUNT, 0, 0, 0, 0]);

/// `floor(percentage * led_count / 100)`.
pub fn lit_count(percentage: u8, led_count: u8) -> u8 {
    let lit = u16::from(percentage) * u16::from(led_count) / 100;
    u8::try_from(lit).unwrap_or(led_count)
}

/// Renders a lighting intent into the register payload.
///
/// For `Mode::Marquee` this is the step template with index 0; the
/// marquee runner stamps the LED index into it for every step.
pub fn encode(mode: Mode, percentage: u8, position: u8, led_count: u8, color: Rgb) -> Payload {
    let lit = lit_count(percentage, led_count);
    match mode {
        Mode::Normal => Payload::build(OP_SOLID, lit, color, TRAILER_SOLID),
        Mode::Breathe => Payload::build(OP_BREATHE, lit, color, BREATHE_SPEED),
        Mode::Strobe => Payload::build(OP_STROBE, lit, color, STROBE_SPEED),
        Mode::Single => Payload::build(OP_SINGLE, position, color, 0x00),
        Mode::Marquee => marquee_template(color),
    }
}

pub fn marquee_template(color: Rgb) -> Payload {
    Payload::build(OP_SINGLE, 0, color, 0x00)
}

/// Clears the single LED at `index`.
pub fn led_off(index: u8) -> Payload {
    Payload::build(OP_SINGLE, index, Rgb::default(), 0x00)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primary {
    Red,
    Blue,
    Green,
}

impl Primary {
    pub fn color(self) -> Rgb {
        match self {
            Primary::Red => Rgb::new(PRESET_LEVEL, 0, 0),
            Primary::Blue => Rgb::new(0, 0, PRESET_LEVEL),
            Primary::Green => Rgb::new(0, PRESET_LEVEL, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primary::Red => "red",
            Primary::Blue => "blue",
            Primary::Green => "green",
        }
    }
}

/// Numbered quick commands `0`..=`12`. They bypass the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Off,
    Solid(Primary),
    Breathe(Primary),
    Strobe(Primary),
    Marquee(Primary),
}

impl Preset {
    pub fn from_number(n: u8) -> Option<Self> {
        const ORDER: [Primary; 3] = [Primary::Red, Primary::Blue, Primary::Green];
        let pick = |base: u8| ORDER[usize::from(n - base)];
        Some(match n {
            0 => Preset::Off,
            1..=3 => Preset::Solid(pick(1)),
            4..=6 => Preset::Breathe(pick(4)),
            7..=9 => Preset::Strobe(pick(7)),
            10..=12 => Preset::Marquee(pick(10)),
            _ => return None,
        })
    }

    /// The payload for a one-shot preset, or the step template for a
    /// marquee preset.
    pub fn payload(self) -> Payload {
        match self {
            Preset::Off => ALL_OFF,
            Preset::Solid(p) => {
                Payload::build(OP_SOLID, PRESET_COUNT, p.color(), TRAILER_SOLID)
            }
            Preset::Breathe(p) => {
                Payload::build(OP_BREATHE, PRESET_COUNT, p.color(), BREATHE_SPEED)
            }
            Preset::Strobe(p) => {
                Payload::build(OP_STROBE, PRESET_COUNT, p.color(), STROBE_SPEED)
            }
            Preset::Marquee(p) => marquee_template(p.color()),
        }
    }

    pub fn describe(self) -> String {
        match self {
            Preset::Off => "all off".to_string(),
            Preset::Solid(p) => format!("all solid {}", p.name()),
            Preset::Breathe(p) => format!("all breathe {}", p.name()),
            Preset::Strobe(p) => format!("all strobe {}", p.name()),
            Preset::Marquee(p) => format!("marquee {}", p.name()),
        }
    }
}
