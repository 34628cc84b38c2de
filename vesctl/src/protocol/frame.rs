//! VESC command packet codec.
//!
//! This module implements the binary packet format spoken by VESC-class
//! motor controllers over serial.
//!
//! ## Packet Format
//!
//! ```text
//! +-------+--------+---------------+--------+------+
//! | Start | Length |    Payload    | CRC16  | End  |
//! +-------+--------+---------------+--------+------+
//! | 1     | 1 or 2 |   variable    | 2      | 1    |
//! +-------+--------+---------------+--------+------+
//! | 0x02  |  len   | id + fields   | CRC    | 0x03 |
//! +-------+--------+---------------+--------+------+
//! ```
//!
//! Short packets (payload up to 255 bytes) start with 0x02 and carry a
//! one-byte length; long packets start with 0x03 and carry a two-byte
//! big-endian length. All payload fields are big-endian. The CRC16-XMODEM
//! checksum covers the payload only.

use {
    crate::error::FrameError,
    crate::protocol::crc::crc16_xmodem,
    byteorder::{BigEndian, WriteBytesExt},
};

/// Start byte for packets with a one-byte length field.
pub const PACKET_START_SHORT: u8 = 0x02;

/// Start byte for packets with a two-byte length field.
pub const PACKET_START_LONG: u8 = 0x03;

/// Packet terminator byte.
pub const PACKET_END: u8 = 0x03;

/// Wire scale factor for current values (amps to milliamps fixed point).
pub const CURRENT_SCALE: i32 = 1000;

/// VESC command ids (first payload byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    /// Set motor current (COMM_SET_CURRENT).
    SetCurrent = 6,
    /// Set electrical RPM target (COMM_SET_RPM).
    SetRpm = 8,
    /// Select rotor position display/feedback mode.
    SetRotorPositionMode = 21,
}

/// Rotor position sensing modes accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RotorPositionMode {
    /// Position display disabled.
    None = 0,
    /// Inductance-based sensing.
    Inductance = 1,
    /// Sensorless observer.
    Observer = 2,
    /// Encoder feedback.
    #[default]
    Encoder = 3,
    /// Position PID target.
    PidPos = 4,
    /// Position PID error.
    PidPosError = 5,
    /// Encoder/observer disagreement.
    EncoderObserverError = 6,
}

impl RotorPositionMode {
    fn from_wire(value: u8) -> Result<Self, FrameError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Inductance),
            2 => Ok(Self::Observer),
            3 => Ok(Self::Encoder),
            4 => Ok(Self::PidPos),
            5 => Ok(Self::PidPosError),
            6 => Ok(Self::EncoderObserverError),
            other => Err(FrameError::UnknownRotorMode(other)),
        }
    }
}

/// A single outbound controller command.
///
/// Immutable; constructed per send, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Select the rotor position sensing mode.
    SetRotorPositionMode(RotorPositionMode),
    /// Set the target speed in electrical RPM.
    SetRpm(i32),
    /// Set the target current. Scaled by [`CURRENT_SCALE`] on the wire.
    SetCurrent(i32),
}

impl Command {
    /// Get the command id for this command.
    pub fn id(&self) -> CommandId {
        match self {
            Self::SetRotorPositionMode(_) => CommandId::SetRotorPositionMode,
            Self::SetRpm(_) => CommandId::SetRpm,
            Self::SetCurrent(_) => CommandId::SetCurrent,
        }
    }

    /// Build the command payload (id byte plus big-endian fields).
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    fn payload(&self) -> Vec<u8> {
        let mut payload = vec![self.id() as u8];
        match *self {
            Self::SetRotorPositionMode(mode) => {
                payload.push(mode as u8);
            },
            Self::SetRpm(rpm) => {
                payload.write_i32::<BigEndian>(rpm).unwrap();
            },
            Self::SetCurrent(value) => {
                payload
                    .write_i32::<BigEndian>(value * CURRENT_SCALE)
                    .unwrap();
            },
        }
        payload
    }

    /// Encode this command into a complete wire packet.
    ///
    /// Always produces a short packet; every command payload here is at most
    /// five bytes. Byte-exact against the controller's documented layout.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();

        let mut buf = Vec::with_capacity(payload.len() + 5);
        buf.push(PACKET_START_SHORT);
        // Safe cast: command payloads are at most 5 bytes
        buf.push(payload.len() as u8);
        buf.extend_from_slice(&payload);
        buf.write_u16::<BigEndian>(crc16_xmodem(&payload)).unwrap();
        buf.push(PACKET_END);

        buf
    }

    /// Decode a single packet from the start of `data`.
    ///
    /// Accepts both short and long packet headers. Fails with the
    /// corresponding [`FrameError`] when the checksum mismatches, the length
    /// is inconsistent, or the payload is not one of the modeled commands.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let (payload, _) = split_packet(data)?;
        Self::from_payload(payload)
    }

    /// Decode every packet in a captured byte stream, in order.
    ///
    /// Useful for verifying a transmitted command sequence against a
    /// simulated controller.
    pub fn decode_stream(mut data: &[u8]) -> Result<Vec<Self>, FrameError> {
        let mut commands = Vec::new();
        while !data.is_empty() {
            let (payload, consumed) = split_packet(data)?;
            commands.push(Self::from_payload(payload)?);
            data = &data[consumed..];
        }
        Ok(commands)
    }

    /// Parse a validated payload into a command.
    fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        let id = payload[0];
        let len = payload.len();

        match id {
            id if id == CommandId::SetRotorPositionMode as u8 => {
                if len != 2 {
                    return Err(FrameError::PayloadLength { id, len });
                }
                Ok(Self::SetRotorPositionMode(RotorPositionMode::from_wire(
                    payload[1],
                )?))
            },
            id if id == CommandId::SetRpm as u8 => {
                if len != 5 {
                    return Err(FrameError::PayloadLength { id, len });
                }
                let rpm = i32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
                Ok(Self::SetRpm(rpm))
            },
            id if id == CommandId::SetCurrent as u8 => {
                if len != 5 {
                    return Err(FrameError::PayloadLength { id, len });
                }
                let raw = i32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
                Ok(Self::SetCurrent(raw / CURRENT_SCALE))
            },
            other => Err(FrameError::UnknownCommand(other)),
        }
    }
}

/// Validate one packet at the start of `data`.
///
/// Returns the payload slice and the total number of bytes consumed.
fn split_packet(data: &[u8]) -> Result<(&[u8], usize), FrameError> {
    if data.is_empty() {
        return Err(FrameError::Truncated {
            expected: 1,
            actual: 0,
        });
    }

    let (payload_len, header_len) = match data[0] {
        PACKET_START_SHORT => {
            if data.len() < 2 {
                return Err(FrameError::Truncated {
                    expected: 2,
                    actual: data.len(),
                });
            }
            (usize::from(data[1]), 2)
        },
        PACKET_START_LONG => {
            if data.len() < 3 {
                return Err(FrameError::Truncated {
                    expected: 3,
                    actual: data.len(),
                });
            }
            (usize::from(u16::from_be_bytes([data[1], data[2]])), 3)
        },
        other => return Err(FrameError::UnexpectedStart(other)),
    };

    if payload_len == 0 {
        return Err(FrameError::PayloadLength {
            id: 0,
            len: 0,
        });
    }

    // header + payload + crc(2) + end(1)
    let total = header_len + payload_len + 3;
    if data.len() < total {
        return Err(FrameError::Truncated {
            expected: total,
            actual: data.len(),
        });
    }

    let payload = &data[header_len..header_len + payload_len];
    let expected = u16::from_be_bytes([
        data[header_len + payload_len],
        data[header_len + payload_len + 1],
    ]);
    let actual = crc16_xmodem(payload);
    if expected != actual {
        return Err(FrameError::CrcMismatch { expected, actual });
    }

    if data[total - 1] != PACKET_END {
        return Err(FrameError::MissingTerminator);
    }

    Ok((payload, total))
}
