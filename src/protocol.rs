//! Modbus protocol definitions served by the slave
//!
//! Function codes, exception codes and the decoded form of an inbound
//! request body.

use std::fmt;

use crate::constants::{
    EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION,
    FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_COIL,
    FC_WRITE_SINGLE_REGISTER,
};
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier (1-247)
pub type SlaveId = u8;

/// Function codes this slave serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Write Single Coil (0x05), emulated as register value 0/1
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    /// Write Single Register (0x06)
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

impl ModbusFunction {
    /// Convert from u8, rejecting anything this slave does not serve
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_WRITE_SINGLE_COIL => Ok(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Modbus exception codes the slave emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModbusException {
    IllegalFunction = EXCEPTION_ILLEGAL_FUNCTION,
    IllegalDataAddress = EXCEPTION_ILLEGAL_DATA_ADDRESS,
    IllegalDataValue = EXCEPTION_ILLEGAL_DATA_VALUE,
}

impl ModbusException {
    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => {
                "The function code received in the query is not an allowable action for the server"
            }
            Self::IllegalDataAddress => {
                "The data address received in the query is not an allowable address for the server"
            }
            Self::IllegalDataValue => {
                "A value contained in the query data field is not an allowable value for server"
            }
        }
    }
}

impl fmt::Display for ModbusException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Modbus Exception 0x{:02X}: {}",
            self.to_u8(),
            self.description()
        )
    }
}

/// Decoded request body, borrowing the inbound frame.
///
/// Range and value checks happen when the request is applied to the
/// register table, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequest<'a> {
    ReadHoldingRegisters {
        start: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        address: u16,
        value: u16,
    },
    WriteSingleRegister {
        address: u16,
        value: u16,
    },
    /// `values` is the raw payload after the byte-count field
    WriteMultipleRegisters {
        start: u16,
        quantity: u16,
        values: &'a [u8],
    },
}

impl<'a> ModbusRequest<'a> {
    /// Decode the payload following the function code.
    ///
    /// `payload` excludes address, function code and CRC. A payload too
    /// short for its function is an `InvalidData` error.
    pub fn decode(function: ModbusFunction, payload: &'a [u8]) -> ModbusResult<Self> {
        if payload.len() < 4 {
            return Err(ModbusError::invalid_data(format!(
                "{} request truncated: {} payload bytes",
                function,
                payload.len()
            )));
        }

        let first = u16::from_be_bytes([payload[0], payload[1]]);
        let second = u16::from_be_bytes([payload[2], payload[3]]);

        match function {
            ModbusFunction::ReadHoldingRegisters => Ok(Self::ReadHoldingRegisters {
                start: first,
                quantity: second,
            }),
            ModbusFunction::WriteSingleCoil => Ok(Self::WriteSingleCoil {
                address: first,
                value: second,
            }),
            ModbusFunction::WriteSingleRegister => Ok(Self::WriteSingleRegister {
                address: first,
                value: second,
            }),
            ModbusFunction::WriteMultipleRegisters => {
                // Byte-count field at payload[4] is not validated
                let values = payload.get(5..).unwrap_or(&[]);
                Ok(Self::WriteMultipleRegisters {
                    start: first,
                    quantity: second,
                    values,
                })
            }
        }
    }
}

/// Decode `quantity` big-endian words from an FC16 payload.
pub fn decode_register_values(values: &[u8], quantity: u16) -> ModbusResult<Vec<u16>> {
    let needed = usize::from(quantity) * 2;
    if values.len() < needed {
        return Err(ModbusError::invalid_data(format!(
            "Write multiple registers payload too short: {} bytes for {} registers",
            values.len(),
            quantity
        )));
    }

    Ok(values[..needed]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}
