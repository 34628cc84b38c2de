//! Refresh scheduler.
//!
//! VESC-class controllers run a command watchdog that faults the motor to a
//! stop if no valid command arrives within its interval. While a session is
//! running, this background task resends the RPM target at a fixed cadence
//! to keep the watchdog fed.

use {
    crate::{
        link::{SerialLink, lock_unpoisoned},
        port::PortFactory,
        protocol::Command,
        session::SessionState,
    },
    log::{debug, trace, warn},
    std::{
        sync::{Arc, Mutex, mpsc},
        thread,
        time::Duration,
    },
};

/// Interval between RPM refresh commands.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the periodic refresh task.
///
/// At most one task exists per motor session. Cancellation is
/// cancel-then-join: after [`cancel`](Self::cancel) returns, the loop has
/// exited and no further frame will be written.
pub struct RefreshHandle {
    cancel_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawn the refresh loop resending `rpm` every `interval`.
    ///
    /// The loop shares the link mutex with foreground calls, so a refresh
    /// write and a foreground write can never interleave mid-frame. On a
    /// write failure it terminates itself and flips the shared session state
    /// to [`SessionState::Stopped`] instead of retrying.
    pub fn spawn<F: PortFactory>(
        link: Arc<Mutex<SerialLink<F>>>,
        state: Arc<Mutex<SessionState>>,
        rpm: i32,
        interval: Duration,
    ) -> Self {
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

        let thread = thread::spawn(move || {
            debug!("refresh loop started at {interval:?} for {rpm} rpm");
            loop {
                // The channel doubles as the inter-tick sleep: a cancel
                // request wakes the loop immediately instead of after a
                // full interval.
                match cancel_rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {},
                }

                let frame = Command::SetRpm(rpm).encode();
                if let Err(e) = lock_unpoisoned(&link).write(&frame) {
                    warn!("rpm refresh failed, marking session stopped: {e}");
                    *lock_unpoisoned(&state) = SessionState::Stopped;
                    break;
                }
                trace!("refreshed rpm target {rpm}");
            }
            debug!("refresh loop exited");
        });

        Self {
            cancel_tx,
            thread: Some(thread),
        }
    }

    /// Request cancellation and join the loop.
    ///
    /// Guarantees no refresh frame is written after this returns.
    pub fn cancel(&mut self) {
        let _ = self.cancel_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Whether the loop is still running.
    pub fn is_active(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
