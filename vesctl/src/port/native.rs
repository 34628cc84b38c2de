//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::LinkError,
        port::{Port, PortEnumerator, PortFactory, PortInfo, SerialConfig},
    },
    log::trace,
    serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits},
    std::io::{Read, Write},
};

/// Native serial port.
pub struct NativePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl NativePort {
    /// Open a serial port with the given configuration (8-N-1, no flow
    /// control — the only framing VESC-class controllers speak).
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        trace!(
            "Opening {} at {} baud",
            config.port_name, config.baud_rate
        );

        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| LinkError::OpenFailed {
                port: config.port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port,
            name: config.port_name.clone(),
        })
    }
}

impl Port for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), LinkError> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| LinkError::IoFailure(e.into()))
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

/// Factory producing [`NativePort`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortFactory;

impl PortFactory for NativePortFactory {
    type Port = NativePort;

    fn open(&self, config: &SerialConfig) -> Result<NativePort, LinkError> {
        NativePort::open(config)
    }
}

/// Native port enumerator.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>, LinkError> {
        let ports = serialport::available_ports()
            .map_err(|e| LinkError::IoFailure(std::io::Error::other(e)))?;

        Ok(ports
            .into_iter()
            .map(|p| {
                let (vid, pid, product) = match &p.port_type {
                    serialport::SerialPortType::UsbPort(info) => {
                        (Some(info.vid), Some(info.pid), info.product.clone())
                    },
                    _ => (None, None, None),
                };

                PortInfo {
                    name: p.port_name,
                    vid,
                    pid,
                    product,
                }
            })
            .collect())
    }
}
