//! VESC wire protocol implementation.

pub mod crc;
pub mod frame;

// Re-export common types
pub use frame::{Command, CommandId, CURRENT_SCALE, RotorPositionMode};
