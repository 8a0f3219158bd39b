use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::device::LinkSettings;
use crate::error::ConfigError;
use crate::marquee::DEFAULT_DWELL;
use crate::state::Rgb;

pub const SETTINGS_FILE: &str = "lampctl.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub slave_id: u8,
    pub timeout_ms: u64,
    pub led_count: Option<i64>,
    pub dwell_ms: u64,
    pub color: Rgb,
    pub percentage: i64,
    pub position: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 19200,
            slave_id: 1,
            timeout_ms: 1000,
            led_count: None,
            dwell_ms: DEFAULT_DWELL.as_millis() as u64,
            color: Rgb::new(3, 4, 5),
            percentage: 100,
            position: 1,
        }
    }
}

impl Settings {
    /// Defaults, then the settings file, then `LAMPCTL_*` variables.
    ///
    /// Without an explicit `path` a missing `lampctl.json` is fine; an
    /// explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(SETTINGS_FILE).exists() => Self::from_file(Path::new(SETTINGS_FILE))?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Self::from_json(&raw, path)
    }

    fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LAMPCTL_PORT") {
            self.port = Some(v);
        }
        if let Some(v) = parsed(&lookup, "LAMPCTL_BAUD_RATE") {
            self.baud_rate = v;
        }
        if let Some(v) = parsed(&lookup, "LAMPCTL_SLAVE_ID") {
            self.slave_id = v;
        }
        if let Some(v) = parsed(&lookup, "LAMPCTL_LED_COUNT") {
            self.led_count = Some(v);
        }
    }

    pub fn link(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            slave_id: self.slave_id,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

/// LED counts must fit the one-byte index and leave at least one
/// addressable position for single mode.
pub fn checked_led_count(value: i64) -> Option<u8> {
    u8::try_from(value).ok().filter(|&n| n >= 2)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.baud_rate, 19200);
        assert_eq!(settings.slave_id, 1);
        assert_eq!(settings.dwell(), Duration::from_millis(500));
        assert_eq!(settings.link().timeout, Duration::from_secs(1));
        assert_eq!(settings.color, Rgb::new(3, 4, 5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let raw = r#"{ "port": "COM7", "led_count": 60, "color": { "r": 1, "g": 2, "b": 3 } }"#;
        let settings = Settings::from_json(raw, Path::new("x.json")).unwrap();
        assert_eq!(settings.port.as_deref(), Some("COM7"));
        assert_eq!(settings.led_count, Some(60));
        assert_eq!(settings.color, Rgb::new(1, 2, 3));
        assert_eq!(settings.baud_rate, 19200);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = Settings::from_json(r#"{ "baud": 9600 }"#, Path::new("x.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/lampctl.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LAMPCTL_PORT", "/dev/ttyUSB0"),
            ("LAMPCTL_BAUD_RATE", "9600"),
            ("LAMPCTL_SLAVE_ID", "not-a-number"),
            ("LAMPCTL_LED_COUNT", "12"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.slave_id, 1);
        assert_eq!(settings.led_count, Some(12));
    }

    #[test]
    fn test_checked_led_count() {
        assert_eq!(checked_led_count(30), Some(30));
        assert_eq!(checked_led_count(255), Some(255));
        assert_eq!(checked_led_count(1), None);
        assert_eq!(checked_led_count(0), None);
        assert_eq!(checked_led_count(256), None);
        assert_eq!(checked_led_count(-3), None);
    }
}
