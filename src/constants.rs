//! Modbus RTU constants used by the slave frame engine
//!
//! Frame limits follow the serial line ADU definition:
//! - Maximum RTU frame: 256 bytes (address + PDU + CRC)
//! - Maximum PDU size: 253 bytes
//! - Register limits are calculated to fit within the PDU size constraint

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum RTU frame size (ADU), also the capacity of the inbound and
/// outbound frame buffers.
pub const MAX_RTU_FRAME_SIZE: usize = 256;

/// Length of the trailing CRC field
pub const CRC_LEN: usize = 2;

/// Maximum PDU (Protocol Data Unit) size
///
/// RTU ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = MAX_RTU_FRAME_SIZE - 1 - CRC_LEN;

/// Shortest frame worth checking: address, function code and CRC
pub const MIN_REQUEST_FRAME_LEN: usize = 1 + 1 + CRC_LEN;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response PDU: Function Code (1) + Byte Count (1) + N × 2 ≤ 253
/// Therefore: N ≤ 125
pub const MAX_READ_REGISTERS: usize = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// Request PDU: Function Code (1) + Address (2) + Quantity (2) + Byte Count (1) + N × 2 ≤ 253
/// Therefore: N ≤ 123
pub const MAX_WRITE_REGISTERS: usize = 123;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

// ============================================================================
// Coil Values
// ============================================================================

/// Wire value of a coil switched ON (FC05)
pub const COIL_ON: u16 = 0xFF00;

/// Wire value of a coil switched OFF (FC05)
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Slave Addressing
// ============================================================================

/// Broadcast address, not served by this slave
pub const BROADCAST_ADDRESS: u8 = 0;

/// Lowest assignable slave address
pub const MIN_SLAVE_ADDRESS: u8 = 1;

/// Highest assignable slave address
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// Address the slave answers to until configured otherwise
pub const DEFAULT_SLAVE_ADDRESS: u8 = 247;

// ============================================================================
// Line Timing
// ============================================================================

/// Default line rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Bits per character on the wire: start + 8 data + parity + stop
pub const BITS_PER_CHARACTER: u64 = 11;

/// Above this rate the inter-character timeout is fixed
pub const FIXED_TIMING_BAUD_THRESHOLD: u32 = 19200;

/// Fixed inter-frame silence used above 19200 baud (microseconds)
pub const FIXED_INTER_CHAR_TIMEOUT_US: u64 = 1750;

/// Default bound on a single response transmission (milliseconds)
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u64 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MAX_RTU_FRAME_SIZE, 256);
        assert_eq!(MAX_PDU_SIZE, 253);
        assert_eq!(MIN_REQUEST_FRAME_LEN, 4);
    }

    #[test]
    fn test_register_limits() {
        let read_pdu_size = 1 + 1 + (MAX_READ_REGISTERS * 2);
        assert!(read_pdu_size <= MAX_PDU_SIZE);

        let write_pdu_size = 1 + 2 + 2 + 1 + (MAX_WRITE_REGISTERS * 2);
        assert!(write_pdu_size <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_exception_function_codes() {
        assert_eq!(FC_READ_HOLDING_REGISTERS | EXCEPTION_FLAG, 0x83);
        assert_eq!(99 | EXCEPTION_FLAG, 0xE3);
    }
}
