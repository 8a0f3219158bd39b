// src/device.rs
use std::time::Duration;

use tokio_modbus::client::sync::{self, Writer};
use tokio_modbus::Slave;
use tokio_serial::{DataBits, Parity, StopBits};
use tracing::debug;

use crate::commands::{Payload, REGISTER_ADDRESS, REGISTER_COUNT};
use crate::error::TransportError;

/// Anything that can push a register payload to the strip controller.
///
/// Exactly one owner holds the writer at a time: the command engine, or a
/// running marquee which hands it back when it stops.
pub trait RegisterWriter: Send {
    fn write_registers(
        &mut self,
        address: u16,
        count: u16,
        payload: &Payload,
    ) -> Result<(), TransportError>;

    /// Writes at the controller's fixed register block.
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        self.write_registers(REGISTER_ADDRESS, REGISTER_COUNT, payload)
    }
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub slave_id: u8,
    pub timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 19200,
            slave_id: 1,
            timeout: Duration::from_secs(1),
        }
    }
}

pub struct ModbusDevice {
    name: String,
    ctx: sync::Context,
}

impl ModbusDevice {
    pub fn connect(port_name: &str, link: &LinkSettings) -> Result<Self, TransportError> {
        let builder = tokio_serial::new(port_name, link.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(link.timeout);

        let mut ctx = sync::rtu::connect_slave(&builder, Slave(link.slave_id))?;
        ctx.set_timeout(link.timeout);

        Ok(Self {
            name: port_name.to_string(),
            ctx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RegisterWriter for ModbusDevice {
    fn write_registers(
        &mut self,
        address: u16,
        count: u16,
        payload: &Payload,
    ) -> Result<(), TransportError> {
        let registers = payload.registers();
        if usize::from(count) != registers.len() {
            return Err(TransportError::InvalidRequest(format!(
                "payload spans {} registers, asked to write {}",
                registers.len(),
                count
            )));
        }
        debug!(
            port = %self.name,
            address,
            opcode = payload.opcode(),
            %payload,
            "write registers"
        );
        self.ctx
            .write_multiple_registers(address, &registers)?
            .map_err(TransportError::Exception)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::mpsc::{Receiver, Sender};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory writer that records every payload sent to it.
    #[derive(Clone, Default)]
    pub struct RecordingWriter {
        pub log: Arc<Mutex<Vec<Payload>>>,
        pub fail: Arc<Mutex<bool>>,
        pub fail_next: Arc<Mutex<bool>>,
    }

    impl RecordingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn payloads(&self) -> Vec<Payload> {
            self.log.lock().unwrap().clone()
        }

        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        /// Fails only the next write; later writes go through.
        pub fn fail_next_write(&self) {
            *self.fail_next.lock().unwrap() = true;
        }
    }

    impl RegisterWriter for RecordingWriter {
        fn write_registers(
            &mut self,
            address: u16,
            count: u16,
            payload: &Payload,
        ) -> Result<(), TransportError> {
            assert_eq!((address, count), (REGISTER_ADDRESS, REGISTER_COUNT));
            let once = std::mem::take(&mut *self.fail_next.lock().unwrap());
            if once || *self.fail.lock().unwrap() {
                return Err(TransportError::Unavailable);
            }
            self.log.lock().unwrap().push(*payload);
            Ok(())
        }
    }

    /// Records like `RecordingWriter`, but on the `pause_on`-th write of an
    /// opcode-6 payload with a non-zero color it reports through `reached`
    /// and blocks until `resume` fires.
    pub struct GatedWriter {
        pub inner: RecordingWriter,
        pub pause_on: usize,
        pub steps: usize,
        pub reached: Sender<u8>,
        pub resume: Receiver<()>,
    }

    impl RegisterWriter for GatedWriter {
        fn write_registers(
            &mut self,
            address: u16,
            count: u16,
            payload: &Payload,
        ) -> Result<(), TransportError> {
            self.inner.write_registers(address, count, payload)?;
            let lit = payload.as_bytes()[2..5].iter().any(|&c| c != 0);
            if lit {
                self.steps += 1;
                if self.steps == self.pause_on {
                    let _ = self.reached.send(payload.index());
                    let _ = self.resume.recv();
                }
            }
            Ok(())
        }
    }
}
