use std::path::PathBuf;

use thiserror::Error;

/// Rejected operator input. State is left untouched and nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("percentage must be between 1 and 100, got {0}")]
    Percentage(i64),

    #[error("position must be between 1 and {max}, got {value}")]
    Position { value: i64, max: i64 },

    #[error("rgb channel {channel} must be between 0 and 255, got {value}")]
    Channel { channel: char, value: i64 },

    #[error("expected r,g,b but got {0:?}")]
    MalformedColor(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("modbus: {0}")]
    Modbus(#[from] tokio_modbus::Error),

    #[error("device answered with modbus exception {0:?}")]
    Exception(tokio_modbus::ExceptionCode),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("device link lost")]
    Unavailable,
}

/// Startup failures. The engine cannot run without these resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no usable serial port found (tried {tried})")]
    NoUsablePort { tried: usize },

    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("control error: {0}")]
    Transport(#[from] TransportError),

    #[error("unknown command {0:?}, type h for help or q to quit")]
    UnknownCommand(String),
}
