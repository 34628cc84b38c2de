//! Serial link manager.
//!
//! Owns the single serial device handle and its open/closed lifecycle. All
//! writes go through here; the handle is never left half-open.

use {
    crate::{
        error::LinkError,
        port::{Port, PortFactory, SerialConfig},
    },
    log::{debug, trace},
    std::sync::{Mutex, MutexGuard, PoisonError},
};

/// Lock a mutex, recovering the guard if a holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Manages one serial device handle.
///
/// Open and close are idempotent. Exactly one underlying handle exists at a
/// time: `ensure_open` on an already-open link is a no-op success, and
/// `close` drops the handle so reopening cannot leak a duplicate.
pub struct SerialLink<F: PortFactory> {
    factory: F,
    config: SerialConfig,
    port: Option<F::Port>,
}

impl<F: PortFactory> SerialLink<F> {
    /// Create a closed link for the given transport configuration.
    pub fn new(factory: F, config: SerialConfig) -> Self {
        Self {
            factory,
            config,
            port: None,
        }
    }

    /// The transport configuration this link opens with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Open the configured device if not already open.
    pub fn ensure_open(&mut self) -> Result<(), LinkError> {
        if self.port.is_some() {
            trace!("{} already open", self.config.port_name);
            return Ok(());
        }

        let mut port = self.factory.open(&self.config)?;
        // Stale bytes from a previous holder must not precede our frames.
        port.clear_buffers()?;
        debug!(
            "{} open at {} baud",
            port.name(),
            self.config.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    /// Write raw bytes to the open device.
    ///
    /// Fails with [`LinkError::NotOpen`] while closed; a write attempted on a
    /// closed link is a contract violation, never silently dropped.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        port.write_all_bytes(bytes)
    }

    /// Close the device if open; no-op when already closed.
    pub fn close(&mut self) -> Result<(), LinkError> {
        if let Some(port) = self.port.take() {
            debug!("{} closed", port.name());
        }
        Ok(())
    }

    /// Whether the device is currently open. No side effects.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
