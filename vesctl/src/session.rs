//! Motor session state machine.
//!
//! Coordinates the serial link manager and the frame codec to realize
//! `start`, `stop` and the periodic RPM refresh. Every operation leaves the
//! session in a determinate state: `stop` transitions to [`SessionState::Stopped`]
//! and closes the link even when the de-energize command itself fails.

use {
    crate::{
        error::{LinkError, SessionError},
        link::{SerialLink, lock_unpoisoned},
        port::{PortFactory, SerialConfig},
        protocol::{Command, RotorPositionMode},
        refresh::{REFRESH_INTERVAL, RefreshHandle},
    },
    log::{debug, info, trace, warn},
    std::{
        sync::{Arc, Mutex},
        time::Duration,
    },
};

/// Maximum accepted RPM target.
pub const RPM_MAX: i32 = 100_000;

/// Maximum accepted duty cycle, in percent.
pub const DUTY_MAX: u8 = 100;

/// Observable session state reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Motor is not commanded; no targets are held.
    Stopped,
    /// Motor is commanded with the given targets.
    Running {
        /// Last commanded RPM target.
        rpm: i32,
        /// Last commanded duty cycle, in percent.
        duty_percent: u8,
    },
}

impl SessionState {
    /// Whether the motor is commanded running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// The protocol-level state machine owning one serial link.
///
/// Foreground calls and the background refresh loop share the link behind a
/// single mutex, so two writers can never interleave mid-frame.
pub struct MotorSession<F: PortFactory> {
    link: Arc<Mutex<SerialLink<F>>>,
    state: Arc<Mutex<SessionState>>,
    refresh: Option<RefreshHandle>,
    refresh_interval: Duration,
}

impl<F: PortFactory> MotorSession<F> {
    /// Create a session for the given transport configuration.
    ///
    /// The link stays closed until `connect` or `start` is called.
    pub fn new(factory: F, config: SerialConfig) -> Self {
        Self {
            link: Arc::new(Mutex::new(SerialLink::new(factory, config))),
            state: Arc::new(Mutex::new(SessionState::Stopped)),
            refresh: None,
            refresh_interval: REFRESH_INTERVAL,
        }
    }

    /// Override the RPM refresh interval (default 100 ms).
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Open the serial link. Idempotent.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        lock_unpoisoned(&self.link).ensure_open()?;
        Ok(())
    }

    /// Close the serial link. Idempotent.
    ///
    /// Cancels any live refresh loop first and marks the session stopped, so
    /// no background write can race the closing handle.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        self.cancel_refresh();
        *lock_unpoisoned(&self.state) = SessionState::Stopped;
        lock_unpoisoned(&self.link).close()?;
        Ok(())
    }

    /// Whether the serial link is currently open.
    pub fn is_connected(&self) -> bool {
        lock_unpoisoned(&self.link).is_open()
    }

    /// Start (or retarget) the motor.
    ///
    /// Sends, in order: rotor position mode (encoder), the RPM target, and
    /// the duty-derived current command. Mode must be set before RPM/current
    /// are meaningful to the device. On success the session is Running and
    /// the refresh loop is (re)bound to `rpm`; calling `start` while already
    /// Running replaces the targets without spawning a second loop.
    pub fn start(&mut self, rpm: i32, duty_percent: u8) -> Result<(), SessionError> {
        if !(0..=RPM_MAX).contains(&rpm) {
            return Err(SessionError::InvalidTarget(format!(
                "rpm {rpm} outside 0..={RPM_MAX}"
            )));
        }
        if duty_percent > DUTY_MAX {
            return Err(SessionError::InvalidTarget(format!(
                "duty {duty_percent}% outside 0..={DUTY_MAX}"
            )));
        }

        // A live loop still resends the previous target; take it down before
        // the new command sequence goes out.
        self.cancel_refresh();

        if let Err(e) = self.send_start_sequence(rpm, duty_percent) {
            // Determinate state on every path: a failed start is Stopped.
            *lock_unpoisoned(&self.state) = SessionState::Stopped;
            return Err(e.into());
        }

        *lock_unpoisoned(&self.state) = SessionState::Running { rpm, duty_percent };
        info!("motor running at {rpm} rpm, {duty_percent}% duty");

        // Refresh keeps resending the rpm captured here; later target changes
        // only take effect through another start call.
        self.refresh = Some(RefreshHandle::spawn(
            Arc::clone(&self.link),
            Arc::clone(&self.state),
            rpm,
            self.refresh_interval,
        ));

        Ok(())
    }

    /// Stop the motor and close the link.
    ///
    /// Best-effort from the device's perspective, unconditional from the
    /// state machine's: the refresh loop is joined first, the zero-current
    /// command is attempted, and the session ends Stopped with the link
    /// closed on every path. The first error encountered is returned.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        // Join the refresh loop before the zero-current frame so no refresh
        // can re-energize the motor afterwards.
        self.cancel_refresh();

        let mut first_error: Option<LinkError> = None;

        {
            let mut link = lock_unpoisoned(&self.link);
            let sent = link
                .ensure_open()
                .and_then(|()| link.write(&Command::SetCurrent(0).encode()));
            if let Err(e) = sent {
                warn!("failed to send zero-current command: {e}");
                first_error = Some(e);
            }
        }

        *lock_unpoisoned(&self.state) = SessionState::Stopped;

        // Cleanup on all paths: close even when the send above failed.
        if let Err(e) = lock_unpoisoned(&self.link).close() {
            first_error.get_or_insert(e);
        }

        info!("motor stopped");
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Observer for the current session state.
    pub fn current_state(&self) -> SessionState {
        *lock_unpoisoned(&self.state)
    }

    /// Open the link and transmit the start command sequence.
    fn send_start_sequence(&self, rpm: i32, duty_percent: u8) -> Result<(), LinkError> {
        let mut link = lock_unpoisoned(&self.link);
        link.ensure_open()?;

        for command in [
            Command::SetRotorPositionMode(RotorPositionMode::Encoder),
            Command::SetRpm(rpm),
            Command::SetCurrent(i32::from(duty_percent)),
        ] {
            trace!("sending {command:?}");
            link.write(&command.encode())?;
        }

        Ok(())
    }

    /// Cancel and join the refresh loop, if one is live.
    fn cancel_refresh(&mut self) {
        if let Some(mut refresh) = self.refresh.take() {
            debug!("cancelling refresh loop");
            refresh.cancel();
        }
    }
}

impl<F: PortFactory> Drop for MotorSession<F> {
    fn drop(&mut self) {
        // Tear down the link on every exit path.
        self.cancel_refresh();
        let _ = lock_unpoisoned(&self.link).close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockFactory;
    use std::thread;

    const FAST_REFRESH: Duration = Duration::from_millis(10);

    fn test_session(factory: &MockFactory) -> MotorSession<MockFactory> {
        MotorSession::new(factory.clone(), SerialConfig::new("mock0"))
            .with_refresh_interval(FAST_REFRESH)
    }

    fn commands(factory: &MockFactory) -> Vec<Command> {
        Command::decode_stream(&factory.transcript()).unwrap()
    }

    #[test]
    fn test_connect_twice_holds_single_handle() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.connect().unwrap();
        session.connect().unwrap();

        assert!(session.is_connected());
        assert_eq!(factory.open_count(), 1);
    }

    #[test]
    fn test_disconnect_twice_is_noop_second_time() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.connect().unwrap();
        session.disconnect().unwrap();
        assert!(!session.is_connected());

        session.disconnect().unwrap();
        assert!(!session.is_connected());
    }

    #[test]
    fn test_start_sends_mode_rpm_current_in_order() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.start(10_000, 50).unwrap();

        let sent = commands(&factory);
        assert_eq!(
            &sent[..3],
            &[
                Command::SetRotorPositionMode(RotorPositionMode::Encoder),
                Command::SetRpm(10_000),
                Command::SetCurrent(50),
            ]
        );
        assert_eq!(
            session.current_state(),
            SessionState::Running {
                rpm: 10_000,
                duty_percent: 50
            }
        );
    }

    #[test]
    fn test_start_rejects_out_of_range_rpm() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        let err = session.start(150_000, 50).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTarget(_)));

        // State unchanged, nothing transmitted.
        assert_eq!(session.current_state(), SessionState::Stopped);
        assert!(factory.transcript().is_empty());
    }

    #[test]
    fn test_start_rejects_out_of_range_duty() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        let err = session.start(5000, 101).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTarget(_)));
        assert_eq!(session.current_state(), SessionState::Stopped);
    }

    #[test]
    fn test_start_propagates_open_failure_as_link_unavailable() {
        let factory = MockFactory::new();
        factory.set_fail_open(true);
        let mut session = test_session(&factory);

        let err = session.start(5000, 50).unwrap_err();
        assert!(matches!(err, SessionError::LinkUnavailable(_)));
        assert_eq!(session.current_state(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_clears_state_even_when_write_fails() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.start(5000, 50).unwrap();
        factory.set_fail_writes(true);

        let result = session.stop();
        assert!(result.is_err());
        // Fail-safe bias: report Stopped over Running when uncertain.
        assert_eq!(session.current_state(), SessionState::Stopped);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_no_refresh_frame_after_stop() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.start(5000, 50).unwrap();
        session.stop().unwrap();

        // Give a leaked loop (if any) time to misbehave before asserting.
        thread::sleep(FAST_REFRESH * 4);

        let sent = commands(&factory);
        assert_eq!(sent.last(), Some(&Command::SetCurrent(0)));
    }

    #[test]
    fn test_refresh_cadence_while_running() {
        let factory = MockFactory::new();
        let mut session = MotorSession::new(factory.clone(), SerialConfig::new("mock0"));

        // Default 100 ms cadence.
        session.start(8000, 30).unwrap();
        thread::sleep(Duration::from_millis(380));
        session.stop().unwrap();

        let refreshes = commands(&factory)
            .iter()
            .skip(3) // initial mode/rpm/current sequence
            .filter(|c| **c == Command::SetRpm(8000))
            .count();
        assert!(refreshes >= 3, "only {refreshes} refresh frames seen");
    }

    #[test]
    fn test_restart_replaces_targets_without_duplicate_loop() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.start(4000, 20).unwrap();
        session.start(9000, 60).unwrap();
        assert_eq!(
            session.current_state(),
            SessionState::Running {
                rpm: 9000,
                duty_percent: 60
            }
        );

        // Only the new target may be refreshed from here on.
        let before = commands(&factory).len();
        thread::sleep(FAST_REFRESH * 6);
        session.stop().unwrap();

        let sent = commands(&factory);
        assert!(sent.len() > before);
        assert!(
            sent[before..]
                .iter()
                .all(|c| *c != Command::SetRpm(4000)),
            "stale rpm refreshed after restart"
        );
    }

    #[test]
    fn test_link_failure_during_refresh_flips_state_to_stopped() {
        let factory = MockFactory::new();
        let mut session = test_session(&factory);

        session.start(5000, 50).unwrap();
        factory.set_fail_writes(true);
        thread::sleep(FAST_REFRESH * 8);

        assert_eq!(session.current_state(), SessionState::Stopped);
    }

    #[test]
    fn test_end_to_end_run_cycle() {
        let factory = MockFactory::new();
        let mut session = MotorSession::new(factory.clone(), SerialConfig::new("mock0"));

        session.connect().unwrap();
        session.start(10_000, 50).unwrap();
        assert_eq!(
            session.current_state(),
            SessionState::Running {
                rpm: 10_000,
                duty_percent: 50
            }
        );

        thread::sleep(Duration::from_millis(250));
        let periodic = commands(&factory)
            .iter()
            .skip(3)
            .filter(|c| **c == Command::SetRpm(10_000))
            .count();
        assert!(periodic >= 2, "only {periodic} periodic frames seen");

        session.stop().unwrap();
        assert_eq!(session.current_state(), SessionState::Stopped);
        assert!(!session.is_connected());
    }
}
