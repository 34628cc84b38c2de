//! # vesctl
//!
//! A library for controlling VESC-class motor controllers over a serial link.
//!
//! This crate provides the command-protocol, connection-lifecycle and
//! periodic-refresh core for driving a motor controller:
//!
//! - VESC binary packet encoding/decoding (set rotor-position mode, set RPM,
//!   set current) with CRC16-XMODEM checksums
//! - A serial link manager with idempotent open/close and bounded I/O
//!   timeouts
//! - A motor session state machine with determinate `start`/`stop` semantics
//! - A cancellable refresh scheduler that keeps the controller's command
//!   watchdog fed while the motor is running
//!
//! ## Example
//!
//! ```rust,no_run
//! use vesctl::{MotorSession, NativePortFactory, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SerialConfig::new("/dev/ttyACM0");
//!     let mut session = MotorSession::new(NativePortFactory, config);
//!
//!     session.connect()?;
//!     session.start(10_000, 50)?;
//!
//!     // ... motor runs; RPM target is refreshed in the background ...
//!
//!     session.stop()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod link;
pub mod port;
pub mod protocol;
pub mod refresh;
pub mod session;

// Re-exports for convenience
pub use {
    error::{FrameError, LinkError, SessionError},
    link::SerialLink,
    port::{
        NativePort, NativePortEnumerator, NativePortFactory, Port, PortEnumerator, PortFactory,
        PortInfo, SerialConfig,
    },
    protocol::{CURRENT_SCALE, Command, CommandId, RotorPositionMode},
    refresh::{REFRESH_INTERVAL, RefreshHandle},
    session::{DUTY_MAX, MotorSession, RPM_MAX, SessionState},
};
