//! Scripted in-memory port for exercising the link and session state machines.

use {
    crate::{
        error::LinkError,
        port::{Port, PortFactory, SerialConfig},
    },
    std::{
        io::{Read, Write},
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    },
};

/// Shared observation/injection state for a [`MockPort`].
///
/// Cloning shares the underlying transcript, so a test keeps visibility into
/// writes after handing the factory to a link manager.
#[derive(Clone, Default)]
pub(crate) struct MockFactory {
    written: Arc<Mutex<Vec<u8>>>,
    fail_open: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    opened: Arc<AtomicUsize>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every byte written so far, across reopens.
    pub(crate) fn transcript(&self) -> Vec<u8> {
        self.written.lock().expect("transcript lock").clone()
    }

    /// Number of successful opens so far.
    pub(crate) fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Make subsequent opens fail with `OpenFailed`.
    pub(crate) fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with a broken-pipe I/O error.
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl PortFactory for MockFactory {
    type Port = MockPort;

    fn open(&self, config: &SerialConfig) -> Result<MockPort, LinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(LinkError::OpenFailed {
                port: config.port_name.clone(),
                reason: "injected open failure".into(),
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockPort {
            written: Arc::clone(&self.written),
            fail_writes: Arc::clone(&self.fail_writes),
            name: config.port_name.clone(),
        })
    }
}

/// In-memory port handle produced by [`MockFactory`].
pub(crate) struct MockPort {
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    name: String,
}

impl Port for MockPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

impl Read for MockPort {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        // Nothing to read; behave like a serial timeout.
        Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no data",
        ))
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            ));
        }
        self.written.lock().expect("transcript lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
