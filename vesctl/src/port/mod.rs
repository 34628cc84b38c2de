//! Serial port abstraction.
//!
//! The design separates I/O from the connection and session layers: the link
//! manager works against the `Port` and `PortFactory` traits, so the same
//! state machine runs on real hardware and against a scripted mock in tests.

pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::LinkError;

/// Serial transport configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout applied to every device I/O call.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Default baud rate for VESC-class controllers.
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Default per-I/O timeout. Bounds every device call so the refresh
    /// scheduler never blocks indefinitely on a stalled device.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

    /// Create a configuration with the default baud rate and timeout.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: Self::DEFAULT_BAUD,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the per-I/O timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information for discovery.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// An open serial device handle.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<(), LinkError>;

    /// Write all bytes and flush, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<(), LinkError> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Opens ports from a [`SerialConfig`].
///
/// The seam between the link manager and the platform serial layer.
pub trait PortFactory: Send + 'static {
    /// The port type produced by this factory.
    type Port: Port + 'static;

    /// Open a port, or fail with [`LinkError::OpenFailed`].
    fn open(&self, config: &SerialConfig) -> Result<Self::Port, LinkError>;
}

/// Trait for listing available serial ports.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>, LinkError>;
}

// Re-export the native implementation
pub use native::{NativePort, NativePortEnumerator, NativePortFactory};
