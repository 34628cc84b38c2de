//! CRC16-XMODEM checksum used by the VESC packet format.

/// Calculate CRC16-XMODEM (polynomial 0x1021, initial value 0x0000).
///
/// The VESC firmware computes this over the packet payload only, not over
/// the start/length header.
#[must_use]
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;

    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
