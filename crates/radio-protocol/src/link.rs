//! Serial Link to the Radio Module
//!
//! The radio module is a transparent serial bridge: bytes written to the UART
//! go out over the air, bytes received over the air appear on the UART. The
//! receive side is read without blocking, like a hardware FIFO, so it can be
//! serviced from a periodic producer tick.

use crate::error::LinkError;
use ring_buffer::ByteSource;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Duration;
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{info, warn};

/// Serial port settings. Framing is fixed at 8-N-1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub device: String,
    /// Baud rate shared with the radio module
    pub baud_rate: u32,
    /// Read timeout for the underlying port in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 10,
        }
    }
}

/// Byte-oriented, half-duplex connection to the radio module
pub trait SerialLink: ByteSource + Send {
    /// Write all bytes in a single call
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Block until the output buffer has been handed to the module
    fn flush(&mut self) -> Result<(), LinkError>;
}

/// [`SerialLink`] backed by a physical serial port
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialPortLink {
    /// Open the port described by `config`
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        info!("Opening radio serial port {} at {} baud", config.device, config.baud_rate);
        let port = tokio_serial::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()?;
        Ok(Self { port })
    }

    /// Open a second handle to the same port
    pub fn try_clone(&self) -> Result<Self, LinkError> {
        Ok(Self {
            port: self.port.try_clone()?,
        })
    }
}

impl ByteSource for SerialPortLink {
    fn available(&mut self) -> usize {
        match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Failed to poll serial receive buffer: {}", e);
                0
            }
        }
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        match self.port.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => {
                warn!("Serial read failed: {}", e);
                0
            }
        }
    }

    fn discard(&mut self) -> usize {
        let pending = self.available();
        if let Err(e) = self.port.clear(ClearBuffer::Input) {
            warn!("Failed to clear serial receive buffer: {}", e);
            return 0;
        }
        pending
    }
}

impl SerialLink for SerialPortLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        Write::write_all(&mut self.port, bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        Write::flush(&mut self.port)?;
        Ok(())
    }
}
