mod commands;
mod config;
mod device;
mod engine;
mod error;
mod marquee;
mod ports;
mod state;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{checked_led_count, Settings};
use device::ModbusDevice;
use engine::{Command, Engine, Outcome};
use state::{ControlState, DEFAULT_LED_COUNT};

const HELP: &str = "\
usage (h for help, q to quit):

  presets                 description
    0                     all LEDs off
    1 / 2 / 3             all solid: red / blue / green
    4 / 5 / 6             all breathe: red / blue / green
    7 / 8 / 9             all strobe: red / blue / green
    10 / 11 / 12          marquee: red / blue / green

  settings
    sma                   normal (solid) mode
    smb                   breathe mode
    smc                   strobe mode
    smd                   single LED mode
    sme                   marquee mode
    percent=N             light the first N% of the strip, e.g. percent=20
    position=N            LED used by single mode, e.g. position=5
    rgb=R,G,B             color, e.g. rgb=255,0,0 for red

    option                show the current settings
    exec                  apply the current settings
";

#[derive(Parser, Debug)]
#[command(name = "lampctl", about = "Drive a Modbus RTU addressable LED strip from a prompt")]
struct Cli {
    /// Serial port to use; skips discovery
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long)]
    slave_id: Option<u8>,
    /// Number of LEDs on the strip (asked at startup when not set)
    #[arg(long)]
    leds: Option<i64>,
    /// Marquee dwell per LED in milliseconds
    #[arg(long)]
    dwell_ms: Option<u64>,
    /// Settings file (defaults to ./lampctl.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(id) = self.slave_id {
            settings.slave_id = id;
        }
        if let Some(leds) = self.leds {
            settings.led_count = Some(leds);
        }
        if let Some(ms) = self.dwell_ms {
            settings.dwell_ms = ms;
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    cli.apply(&mut settings);

    let candidates = match &settings.port {
        Some(port) => vec![port.clone()],
        None => {
            let ports = ports::list_ports();
            println!("local serial ports:");
            for (i, name) in ports.iter().enumerate() {
                println!("{}:{}", i + 1, name);
            }
            ports
        }
    };

    let link = settings.link();
    let (port_name, device) =
        ports::discover(&candidates, |name| ModbusDevice::connect(name, &link))
            .context("cannot start without a strip controller")?;
    println!("using serial port {}", port_name);
    info!(port = %device.name(), baud = link.baud_rate, slave = link.slave_id, "connected");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let led_count = match settings.led_count {
        Some(n) => led_count_or_default(Some(n)),
        None => {
            print!("number of LEDs on the strip (default {}): ", DEFAULT_LED_COUNT);
            io::stdout().flush()?;
            let answer = lines.next().transpose()?.unwrap_or_default();
            led_count_or_default(answer.trim().parse().ok())
        }
    };

    let mut engine = Engine::new(device, initial_state(led_count, &settings), settings.dwell());
    println!("{HELP}");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            engine.handle(Command::Quit)?;
            break;
        };
        let line = line.context("failed to read command")?;

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match engine.handle(command) {
            Ok(Outcome::Quit) => break,
            Ok(outcome) => report(command, &outcome),
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}

fn led_count_or_default(value: Option<i64>) -> u8 {
    match value.and_then(checked_led_count) {
        Some(n) => {
            println!("using {} LEDs\n", n);
            n
        }
        None => {
            println!("invalid LED count, using the default of {}\n", DEFAULT_LED_COUNT);
            DEFAULT_LED_COUNT
        }
    }
}

fn initial_state(led_count: u8, settings: &Settings) -> ControlState {
    let mut state = ControlState::new(led_count);
    state.set_color(settings.color);
    if let Err(e) = state.set_percentage(settings.percentage) {
        warn!(error = %e, "ignoring configured percentage");
    }
    if let Err(e) = state.set_position(settings.position) {
        warn!(error = %e, "ignoring configured position");
    }
    state
}

fn report(command: Command, outcome: &Outcome) {
    const NEXT: &str = "type 'option' to show the current settings or 'exec' to apply them.";

    match outcome {
        Outcome::Nothing | Outcome::Quit => {}
        Outcome::ModeSet(mode) => println!("mode: {}", mode.label()),
        Outcome::PercentageSet(n) => println!("percentage: {}\n{}", n, NEXT),
        Outcome::PositionSet(n) => println!("position: {}\n{}", n, NEXT),
        Outcome::ColorSet(color) => {
            if color.is_black() {
                println!("color is 0,0,0, exec will switch the LEDs off");
            }
            println!("color: r,g,b={}\n{}", color, NEXT);
        }
        Outcome::Wrote(payload) => match command {
            Command::Preset(preset) => println!("{}", preset.describe()),
            _ => println!("applied {}", payload),
        },
        Outcome::MarqueeStarted(_) => {
            if let Command::Preset(preset) = command {
                println!("{}", preset.describe());
            }
            println!("marquee running, the next device command stops it");
        }
        Outcome::Options(snapshot) => println!("{}\n", snapshot),
        Outcome::Help => println!("{HELP}"),
    }
}
