//! Fixed-capacity RTU frame buffer
//!
//! Inbound and outbound frames live in a stack array sized to the largest
//! RTU ADU, so the frame engine never allocates per frame.

use tracing::debug;

use crate::checksum;
use crate::constants::{
    COIL_OFF, COIL_ON, EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_RTU_FRAME_SIZE,
};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusException, SlaveId};

/// RTU frame: `[address][function][payload...][crc-lo][crc-hi]`
#[derive(Debug, Clone)]
pub struct RtuFrame {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_RTU_FRAME_SIZE],
    /// Actual data length
    len: usize,
}

impl RtuFrame {
    /// Create an empty frame
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_RTU_FRAME_SIZE],
            len: 0,
        }
    }

    /// Create a frame from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        if data.len() > MAX_RTU_FRAME_SIZE {
            return Err(ModbusError::frame(format!(
                "Frame too large: {} bytes (max {})",
                data.len(),
                MAX_RTU_FRAME_SIZE
            )));
        }

        let mut frame = Self::new();
        frame.data[..data.len()].copy_from_slice(data);
        frame.len = data.len();
        Ok(frame)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.is_full() {
            return Err(ModbusError::frame("Frame buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.push((value >> 8) as u8)?;
        self.push((value & 0xFF) as u8)?;
        Ok(())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_RTU_FRAME_SIZE {
            return Err(ModbusError::frame(format!(
                "Frame would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_RTU_FRAME_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Get immutable data slice
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the buffer has reached capacity
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= MAX_RTU_FRAME_SIZE
    }

    /// Buffer capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_RTU_FRAME_SIZE
    }

    /// Clear frame
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Slave address (first byte)
    #[inline]
    pub fn slave_address(&self) -> Option<SlaveId> {
        self.as_slice().first().copied()
    }

    /// Function code (second byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().get(1).copied()
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & EXCEPTION_FLAG != 0)
            .unwrap_or(false)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.as_slice().get(2).copied()
        } else {
            None
        }
    }

    /// Get human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & !EXCEPTION_FLAG {
            FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
            FC_WRITE_SINGLE_COIL => "Write Single Coil",
            FC_WRITE_SINGLE_REGISTER => "Write Single Register",
            FC_WRITE_MULTIPLE_REGISTERS => "Write Multiple Registers",
            _ => "Unknown Function",
        }
    }
}

impl Default for RtuFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for RtuFrame {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for RtuFrame {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for RtuFrame {}

/// Frame builder - fluent API
pub struct FrameBuilder {
    frame: RtuFrame,
}

impl FrameBuilder {
    /// Start a frame addressed to (or from) `address`
    #[inline]
    pub fn new(address: SlaveId) -> Self {
        let mut frame = RtuFrame::new();
        frame.data[0] = address;
        frame.len = 1;
        Self { frame }
    }

    /// Set function code
    #[inline]
    pub fn function_code(mut self, fc: u8) -> ModbusResult<Self> {
        self.frame.push(fc)?;
        Ok(self)
    }

    /// Add a big-endian word (address, quantity or value)
    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.frame.push_u16(value)?;
        Ok(self)
    }

    /// Add several big-endian words
    pub fn words(mut self, values: &[u16]) -> ModbusResult<Self> {
        for &value in values {
            self.frame.push_u16(value)?;
        }
        Ok(self)
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> ModbusResult<Self> {
        self.frame.push(b)?;
        Ok(self)
    }

    /// Add raw data
    #[inline]
    pub fn data(mut self, data: &[u8]) -> ModbusResult<Self> {
        self.frame.extend(data)?;
        Ok(self)
    }

    /// Build the frame without CRC
    #[inline]
    pub fn build(self) -> RtuFrame {
        if let Some(fc) = self.frame.function_code() {
            debug!(
                "Frame built: FC={:02X} ({}), total_len={}",
                fc,
                RtuFrame::function_code_description(fc),
                self.frame.len()
            );
        }
        self.frame
    }

    /// Build the frame and append its CRC
    pub fn build_with_crc(self) -> ModbusResult<RtuFrame> {
        let mut frame = self.build();
        checksum::append(&mut frame)?;
        Ok(frame)
    }

    /// Exception response body: address, function | 0x80, exception code
    pub fn exception(
        address: SlaveId,
        function: u8,
        exception: ModbusException,
    ) -> ModbusResult<RtuFrame> {
        Ok(Self::new(address)
            .function_code(function | EXCEPTION_FLAG)?
            .byte(exception.to_u8())?
            .build())
    }

    /// Build a read holding registers request (FC03), CRC included
    pub fn read_holding_registers(
        address: SlaveId,
        start: u16,
        quantity: u16,
    ) -> ModbusResult<RtuFrame> {
        Self::new(address)
            .function_code(FC_READ_HOLDING_REGISTERS)?
            .word(start)?
            .word(quantity)?
            .build_with_crc()
    }

    /// Build a write single coil request (FC05), CRC included
    pub fn write_single_coil(address: SlaveId, coil: u16, value: bool) -> ModbusResult<RtuFrame> {
        let coil_value = if value { COIL_ON } else { COIL_OFF };
        Self::new(address)
            .function_code(FC_WRITE_SINGLE_COIL)?
            .word(coil)?
            .word(coil_value)?
            .build_with_crc()
    }

    /// Build a write single register request (FC06), CRC included
    pub fn write_single_register(
        address: SlaveId,
        register: u16,
        value: u16,
    ) -> ModbusResult<RtuFrame> {
        Self::new(address)
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .word(register)?
            .word(value)?
            .build_with_crc()
    }

    /// Build a write multiple registers request (FC16), CRC included
    pub fn write_multiple_registers(
        address: SlaveId,
        start: u16,
        values: &[u16],
    ) -> ModbusResult<RtuFrame> {
        let quantity = values.len() as u16;
        let byte_count = (values.len() * 2) as u8;

        Self::new(address)
            .function_code(FC_WRITE_MULTIPLE_REGISTERS)?
            .word(start)?
            .word(quantity)?
            .byte(byte_count)?
            .words(values)?
            .build_with_crc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_basic_operations() {
        let mut frame = RtuFrame::new();
        assert!(frame.is_empty());
        assert_eq!(frame.capacity(), 256);

        frame.push(0x01).unwrap();
        frame.push(0x03).unwrap();
        frame.push_u16(0x0100).unwrap();

        assert_eq!(frame.len(), 4);
        assert_eq!(frame.slave_address(), Some(0x01));
        assert_eq!(frame.function_code(), Some(0x03));
        assert!(!frame.is_exception());
        assert_eq!(frame.as_slice(), &[0x01, 0x03, 0x01, 0x00]);

        frame.clear();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_frame_capacity_limit() {
        let mut frame = RtuFrame::from_slice(&[0u8; 256]).unwrap();
        assert!(frame.is_full());
        assert!(frame.push(0xAA).is_err());
        assert!(RtuFrame::from_slice(&[0u8; 257]).is_err());
    }

    #[test]
    fn test_exception_frame() {
        let frame =
            FrameBuilder::exception(0x01, 0x63, ModbusException::IllegalFunction).unwrap();
        assert_eq!(frame.as_slice(), &[0x01, 0xE3, 0x01]);
        assert!(frame.is_exception());
        assert_eq!(frame.exception_code(), Some(0x01));
    }

    #[test]
    fn test_build_read_request() {
        let frame = FrameBuilder::read_holding_registers(0x01, 0x0000, 2).unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]
        );
    }

    #[test]
    fn test_build_write_single_coil() {
        let frame = FrameBuilder::write_single_coil(0x01, 0x000A, true).unwrap();
        assert_eq!(&frame.as_slice()[..6], &[0x01, 0x05, 0x00, 0x0A, 0xFF, 0x00]);
        assert!(checksum::verify(frame.as_slice()));
    }

    #[test]
    fn test_build_write_multiple_registers() {
        let frame = FrameBuilder::write_multiple_registers(0x11, 0x0001, &[0x000A, 0x0102]).unwrap();
        assert_eq!(
            &frame.as_slice()[..11],
            &[0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
        assert_eq!(frame.len(), 13);
    }

    #[test]
    fn test_function_code_description() {
        assert_eq!(RtuFrame::function_code_description(0x03), "Read Holding Registers");
        assert_eq!(RtuFrame::function_code_description(0x90), "Write Multiple Registers");
        assert_eq!(RtuFrame::function_code_description(0x63), "Unknown Function");
    }
}
