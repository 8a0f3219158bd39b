use tracing::{debug, info, warn};

use crate::commands::ALL_OFF;
use crate::device::RegisterWriter;
use crate::error::{ConfigError, TransportError};

/// Serial ports known to the OS, in enumeration order.
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!(error = %e, "serial port enumeration failed");
            Vec::new()
        }
    }
}

/// Opens each candidate in order and keeps the first one that accepts the
/// all-off write.
pub fn discover<W, F>(candidates: &[String], mut open: F) -> Result<(String, W), ConfigError>
where
    W: RegisterWriter,
    F: FnMut(&str) -> Result<W, TransportError>,
{
    for name in candidates {
        let mut writer = match open(name) {
            Ok(w) => w,
            Err(e) => {
                debug!(port = %name, error = %e, "cannot open port");
                continue;
            }
        };
        match writer.send(&ALL_OFF) {
            Ok(()) => {
                info!(port = %name, "strip controller answered");
                return Ok((name.clone(), writer));
            }
            Err(e) => debug!(port = %name, error = %e, "no controller on port"),
        }
    }

    Err(ConfigError::NoUsablePort {
        tried: candidates.len(),
    })
}
