//! Serial port transport for the motor driver board.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::Result;

const DEFAULT_BAUDRATE: u32 = 115_200;
const DEFAULT_TIMEOUT_MS: u64 = 100;

/// A serial link to the driver board implementing
/// `chassis_traits::Transport`.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at the default baud rate.
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with an explicit baud rate.
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        tracing::info!(port = port_name, baudrate, "serial transport opened");
        Ok(Self { port })
    }
}

impl chassis_traits::Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(
        &mut self,
        max_len: usize,
    ) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = vec![0u8; max_len];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // A read timeout just means the board had nothing to say.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(Box::new(e)),
        }
    }
}
