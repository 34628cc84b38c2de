//! Error types for vesctl.

use std::io;
use thiserror::Error;

/// Transport-level errors raised by the serial link manager.
///
/// These are recoverable: the caller may retry `connect`/`start` after the
/// underlying condition (unplugged adapter, busy port) is resolved.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened (permission, not-found, busy).
    #[error("failed to open {port}: {reason}")]
    OpenFailed {
        /// Port name/path that was attempted.
        port: String,
        /// Description from the underlying serial layer.
        reason: String,
    },

    /// A write was attempted while the link is closed.
    #[error("serial link is not open")]
    NotOpen,

    /// Device-level I/O failure on an open link.
    #[error("serial I/O failed: {0}")]
    IoFailure(#[from] io::Error),
}

/// Protocol-level errors raised by the motor session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The serial link could not be opened or failed mid-operation.
    #[error("serial link unavailable: {0}")]
    LinkUnavailable(#[from] LinkError),

    /// A commanded target fell outside the accepted range.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// Detected corruption in an inbound frame.
///
/// Never raised on the outbound-only default flow; the decode path exists for
/// acknowledgement verification against a real or simulated controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// First byte is neither a short nor a long packet start marker.
    #[error("unexpected start byte {0:#04x}")]
    UnexpectedStart(u8),

    /// The buffer is shorter than the length field claims.
    #[error("frame truncated: need {expected} bytes, have {actual}")]
    Truncated {
        /// Total frame length implied by the header.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// CRC checksum mismatch.
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC carried in the frame.
        expected: u16,
        /// CRC computed over the payload.
        actual: u16,
    },

    /// The frame does not end with the terminator byte.
    #[error("missing frame terminator")]
    MissingTerminator,

    /// Payload carries a command id this codec does not model.
    #[error("unknown command id {0:#04x}")]
    UnknownCommand(u8),

    /// Payload length does not match the command's fixed field layout.
    #[error("payload length {len} invalid for command id {id:#04x}")]
    PayloadLength {
        /// Command id from the payload.
        id: u8,
        /// Payload length including the id byte.
        len: usize,
    },

    /// Rotor position mode byte outside the known set.
    #[error("unknown rotor position mode {0:#04x}")]
    UnknownRotorMode(u8),
}
