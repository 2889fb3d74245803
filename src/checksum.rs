//! # Modbus CRC16
//!
//! CRC16/MODBUS (reflected polynomial 0xA001, seed 0xFFFF) over RTU frames.
//! The CRC travels low byte first.
//!
//! ```rust
//! use voltage_rtu_slave::checksum;
//!
//! let request = [0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B];
//! assert_eq!(checksum::compute(&request[..6]), 0x0BC4);
//! assert!(checksum::verify(&request));
//! ```

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::CRC_LEN;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::RtuFrame;

/// CRC calculator for RTU
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC16 of `data`, in reception order.
#[inline]
pub fn compute(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Append the CRC of the frame's current contents, low byte then high byte.
pub fn append(frame: &mut RtuFrame) -> ModbusResult<()> {
    let crc = compute(frame.as_slice());
    frame.extend(&crc.to_le_bytes())
}

/// Check the trailing CRC of a complete frame.
///
/// Frames shorter than the CRC field itself never verify.
pub fn verify(frame: &[u8]) -> bool {
    check(frame).is_ok()
}

/// Like [`verify`], but reports what was expected and what arrived.
pub fn check(frame: &[u8]) -> ModbusResult<()> {
    if frame.len() < CRC_LEN {
        return Err(ModbusError::frame(format!(
            "Frame too short for CRC: {} bytes",
            frame.len()
        )));
    }

    let data_len = frame.len() - CRC_LEN;
    let expected = compute(&frame[..data_len]);
    let actual = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);

    if expected != actual {
        return Err(ModbusError::crc_mismatch(expected, actual));
    }
    Ok(())
}
