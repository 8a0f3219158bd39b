use std::fmt;
use std::mem;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::commands::{encode, Payload, Preset, ALL_OFF};
use crate::device::RegisterWriter;
use crate::error::{EngineError, TransportError};
use crate::marquee::{Marquee, RunnerState};
use crate::state::{parse_number, ControlState, Mode, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Nothing,
    Preset(Preset),
    SetMode(Mode),
    Percent(i64),
    Position(i64),
    Color(Rgb),
    Options,
    Exec,
    Help,
    Quit,
}

impl Command {
    /// Whether the command needs the device and so must stop a running marquee.
    pub fn writes(&self) -> bool {
        matches!(self, Command::Preset(_) | Command::Exec | Command::Quit)
    }
}

/// Parses one prompt line. Whitespace anywhere in the line is ignored.
impl FromStr for Command {
    type Err = EngineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let input: String = line.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some(raw) = input.strip_prefix("percent=") {
            return Ok(Command::Percent(parse_number(raw)?));
        }
        if let Some(raw) = input.strip_prefix("position=") {
            return Ok(Command::Position(parse_number(raw)?));
        }
        if let Some(raw) = input.strip_prefix("rgb=") {
            return Ok(Command::Color(raw.parse()?));
        }

        Ok(match input.as_str() {
            "" => Command::Nothing,
            "sma" => Command::SetMode(Mode::Normal),
            "smb" => Command::SetMode(Mode::Breathe),
            "smc" => Command::SetMode(Mode::Strobe),
            "smd" => Command::SetMode(Mode::Single),
            "sme" => Command::SetMode(Mode::Marquee),
            "option" => Command::Options,
            "exec" => Command::Exec,
            "h" => Command::Help,
            "q" => Command::Quit,
            other => other
                .parse::<u8>()
                .ok()
                // only the literal numbers select a preset, not "010" or "+1"
                .filter(|n| n.to_string() == other)
                .and_then(Preset::from_number)
                .map(Command::Preset)
                .ok_or_else(|| EngineError::UnknownCommand(other.to_string()))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Nothing,
    ModeSet(Mode),
    PercentageSet(u8),
    PositionSet(u8),
    ColorSet(Rgb),
    Wrote(Payload),
    MarqueeStarted(Payload),
    Options(Snapshot),
    Help,
    Quit,
}

/// What `option` shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub mode: Mode,
    pub percentage: u8,
    pub position: u8,
    pub color: Rgb,
    pub led_count: u8,
    pub last_exec: Option<DateTime<Local>>,
    pub runner: RunnerState,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "current options:")?;
        writeln!(f, "\tmode: {}", self.mode.label())?;
        writeln!(f, "\tpercentage: {}", self.percentage)?;
        writeln!(f, "\tposition: {}", self.position)?;
        writeln!(f, "\tcolor: r,g,b={}", self.color)?;
        writeln!(f, "\tleds: {}", self.led_count)?;
        match self.last_exec {
            Some(at) => writeln!(f, "\tlast exec: {}", at.format("%Y-%m-%d %H:%M:%S"))?,
            None => writeln!(f, "\tlast exec: never")?,
        }
        write!(f, "\tanimation: {:?}", self.runner)
    }
}

enum Link<W: RegisterWriter + 'static> {
    Ready(W),
    Animating(Marquee<W>),
    Lost,
}

pub struct Engine<W: RegisterWriter + 'static> {
    state: ControlState,
    link: Link<W>,
    dwell: Duration,
    last_exec: Option<DateTime<Local>>,
}

impl<W: RegisterWriter + 'static> Engine<W> {
    pub fn new(writer: W, state: ControlState, dwell: Duration) -> Self {
        Self {
            state,
            link: Link::Ready(writer),
            dwell,
            last_exec: None,
        }
    }

    pub fn runner_state(&self) -> RunnerState {
        match &self.link {
            Link::Ready(_) => RunnerState::Idle,
            Link::Animating(m) => m.state(),
            Link::Lost => RunnerState::Stopped,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.state.mode(),
            percentage: self.state.percentage(),
            position: self.state.position(),
            color: self.state.color(),
            led_count: self.state.led_count(),
            last_exec: self.last_exec,
            runner: self.runner_state(),
        }
    }

    pub fn handle(&mut self, command: Command) -> Result<Outcome, EngineError> {
        debug!(?command, "handle");
        // quitting must still get through with a lost link
        if command.writes() && command != Command::Quit {
            self.reclaim()?;
        }

        let outcome = match command {
            Command::Nothing => Outcome::Nothing,
            Command::Preset(preset) => match preset {
                Preset::Marquee(_) => self.start_marquee(preset.payload())?,
                _ => self.write(preset.payload())?,
            },
            Command::SetMode(mode) => {
                self.state.set_mode(mode);
                Outcome::ModeSet(mode)
            }
            Command::Percent(n) => Outcome::PercentageSet(self.state.set_percentage(n)?),
            Command::Position(n) => Outcome::PositionSet(self.state.set_position(n)?),
            Command::Color(color) => {
                self.state.set_color(color);
                Outcome::ColorSet(color)
            }
            Command::Options => Outcome::Options(self.snapshot()),
            Command::Exec => self.exec()?,
            Command::Help => Outcome::Help,
            Command::Quit => {
                if let Err(e) = self.write(ALL_OFF) {
                    warn!(error = %e, "could not switch the strip off on exit");
                }
                Outcome::Quit
            }
        };
        Ok(outcome)
    }

    fn exec(&mut self) -> Result<Outcome, TransportError> {
        let s = &self.state;
        let payload = encode(s.mode(), s.percentage(), s.position(), s.led_count(), s.color());
        let outcome = match s.mode() {
            Mode::Marquee => self.start_marquee(payload)?,
            _ => self.write(payload)?,
        };
        self.last_exec = Some(Local::now());
        Ok(outcome)
    }

    fn write(&mut self, payload: Payload) -> Result<Outcome, TransportError> {
        self.reclaim()?.send(&payload)?;
        Ok(Outcome::Wrote(payload))
    }

    fn start_marquee(&mut self, template: Payload) -> Result<Outcome, TransportError> {
        self.reclaim()?;
        match mem::replace(&mut self.link, Link::Lost) {
            Link::Ready(writer) => {
                let marquee = Marquee::spawn(writer, template, self.state.led_count(), self.dwell);
                self.link = Link::Animating(marquee);
                Ok(Outcome::MarqueeStarted(template))
            }
            other => {
                self.link = other;
                Err(TransportError::Unavailable)
            }
        }
    }

    /// Stops a running marquee, if any, and returns the writer it held.
    fn reclaim(&mut self) -> Result<&mut W, TransportError> {
        match mem::replace(&mut self.link, Link::Lost) {
            Link::Animating(marquee) => {
                let (writer, report) = marquee.stop()?;
                if let Some(e) = report.error {
                    warn!(error = %e, "marquee had already stopped after a failed write");
                }
                self.link = Link::Ready(writer);
            }
            other => self.link = other,
        }

        match &mut self.link {
            Link::Ready(writer) => Ok(writer),
            _ => Err(TransportError::Unavailable),
        }
    }
}
