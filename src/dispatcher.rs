//! # Protocol Dispatcher
//!
//! Turns one assembled request frame into either a response frame or a
//! silent drop.
//!
//! ## Processing Order
//!
//! 1. Foreign slave address → silent drop
//! 2. Frame shorter than address + function + CRC → silent drop
//! 3. CRC mismatch → silent drop (the master times out and retries)
//! 4. Under the register lock: decode and apply the request. Failures that
//!    map to a Modbus exception become an exception frame
//!    `[address][function | 0x80][code]`
//! 5. CRC appended to the response
//!
//! | Code | Function | Response |
//! |------|----------|----------|
//! | 0x03 | Read Holding Registers | address, function, byte count, values |
//! | 0x05 | Write Single Coil | echo of the 6 request bytes |
//! | 0x06 | Write Single Register | echo of the 6 request bytes |
//! | 0x10 | Write Multiple Registers | address, function, start, quantity |

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::checksum;
use crate::constants::{
    COIL_OFF, COIL_ON, CRC_LEN, DEFAULT_SLAVE_ADDRESS, MAX_READ_REGISTERS, MAX_SLAVE_ADDRESS,
    MAX_WRITE_REGISTERS, MIN_REQUEST_FRAME_LEN, MIN_SLAVE_ADDRESS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{FrameBuilder, RtuFrame};
use crate::protocol::{decode_register_values, ModbusFunction, ModbusRequest, SlaveId};
use crate::register::{RegisterStore, RegisterTable};

/// Shared, runtime-configurable slave address.
///
/// Read by the dispatcher on every frame; any clone may change it.
#[derive(Debug, Clone)]
pub struct SlaveAddress(Arc<AtomicU8>);

impl SlaveAddress {
    /// Create an address handle, validating the initial value
    pub fn new(address: SlaveId) -> ModbusResult<Self> {
        Self::validate(address)?;
        Ok(Self(Arc::new(AtomicU8::new(address))))
    }

    /// Current address
    #[inline]
    pub fn get(&self) -> SlaveId {
        self.0.load(Ordering::Relaxed)
    }

    /// Change the address; 0 (broadcast) and values above 247 are rejected
    pub fn set(&self, address: SlaveId) -> ModbusResult<()> {
        Self::validate(address)?;
        self.0.store(address, Ordering::Relaxed);
        debug!("Slave address set to {}", address);
        Ok(())
    }

    fn validate(address: SlaveId) -> ModbusResult<()> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address) {
            return Err(ModbusError::configuration(format!(
                "Slave address {} outside {}-{}",
                address, MIN_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS
            )));
        }
        Ok(())
    }
}

impl Default for SlaveAddress {
    fn default() -> Self {
        Self(Arc::new(AtomicU8::new(DEFAULT_SLAVE_ADDRESS)))
    }
}

/// Why a frame produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Nothing to parse
    Empty,
    /// Addressed to another slave
    ForeignAddress { address: SlaveId },
    /// Too short to hold address, function and CRC
    TooShort { len: usize },
    /// Corrupted on the line
    CrcMismatch { expected: u16, actual: u16 },
}

/// Result of dispatching one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// CRC-terminated response ready for transmission
    Response(RtuFrame),
    /// No response is sent
    Dropped(DropReason),
}

impl DispatchOutcome {
    /// Response frame, if any
    pub fn response(&self) -> Option<&RtuFrame> {
        match self {
            Self::Response(frame) => Some(frame),
            Self::Dropped(_) => None,
        }
    }
}

/// Validates and executes requests against the register store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    address: SlaveAddress,
    registers: RegisterStore,
}

impl Dispatcher {
    /// Create a dispatcher answering to `address`
    pub fn new(address: SlaveAddress, registers: RegisterStore) -> Self {
        Self { address, registers }
    }

    /// Address handle
    pub fn address(&self) -> &SlaveAddress {
        &self.address
    }

    /// Register store
    pub fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    /// Process one complete inbound frame.
    ///
    /// Errors are local faults only (poisoned lock); protocol failures come
    /// back as exception responses or drops.
    pub fn dispatch(&self, request: &[u8]) -> ModbusResult<DispatchOutcome> {
        let Some(&target) = request.first() else {
            return Ok(DispatchOutcome::Dropped(DropReason::Empty));
        };

        let address = self.address.get();
        if target != address {
            debug!("Dropping frame for slave {} (we are {})", target, address);
            return Ok(DispatchOutcome::Dropped(DropReason::ForeignAddress {
                address: target,
            }));
        }

        if request.len() < MIN_REQUEST_FRAME_LEN {
            debug!("Dropping {}-byte frame: too short", request.len());
            return Ok(DispatchOutcome::Dropped(DropReason::TooShort {
                len: request.len(),
            }));
        }

        if let Err(ModbusError::CrcMismatch { expected, actual }) = checksum::check(request) {
            warn!(
                "Dropping frame: CRC expected={:04X}, actual={:04X}",
                expected, actual
            );
            return Ok(DispatchOutcome::Dropped(DropReason::CrcMismatch {
                expected,
                actual,
            }));
        }

        let body = &request[..request.len() - CRC_LEN];
        let mut response = {
            let mut table = self.registers.lock()?;
            Self::execute(&mut table, address, body)?
        };

        checksum::append(&mut response)?;
        Ok(DispatchOutcome::Response(response))
    }

    /// Apply `body` (frame without CRC) and build the response, turning
    /// protocol failures into exception frames.
    fn execute(table: &mut RegisterTable, address: SlaveId, body: &[u8]) -> ModbusResult<RtuFrame> {
        let function = body[1];

        match Self::apply(table, address, body) {
            Ok(frame) => Ok(frame),
            Err(err) => match err.to_exception() {
                Some(exception) => {
                    debug!(
                        "FC={:02X} ({}) answered with exception: {}",
                        function,
                        RtuFrame::function_code_description(function),
                        err
                    );
                    FrameBuilder::exception(address, function, exception)
                }
                None => Err(err),
            },
        }
    }

    fn apply(table: &mut RegisterTable, address: SlaveId, body: &[u8]) -> ModbusResult<RtuFrame> {
        let function = ModbusFunction::from_u8(body[1])?;
        let request = ModbusRequest::decode(function, &body[2..])?;

        match request {
            ModbusRequest::ReadHoldingRegisters { start, quantity } => {
                let values = table.read_range(start, quantity)?;
                if usize::from(quantity) > MAX_READ_REGISTERS {
                    return Err(ModbusError::invalid_data(format!(
                        "Read quantity {} exceeds {}",
                        quantity, MAX_READ_REGISTERS
                    )));
                }

                Ok(FrameBuilder::new(address)
                    .function_code(function.to_u8())?
                    .byte((quantity * 2) as u8)?
                    .words(values)?
                    .build())
            }

            ModbusRequest::WriteSingleCoil {
                address: coil,
                value,
            } => {
                table.check_range(coil, 1)?;
                let state = match value {
                    COIL_ON => 1,
                    COIL_OFF => 0,
                    other => {
                        return Err(ModbusError::invalid_data(format!(
                            "Coil value {:04X} is neither ON nor OFF",
                            other
                        )))
                    }
                };
                table.set(usize::from(coil), state);
                Self::echo(body)
            }

            ModbusRequest::WriteSingleRegister {
                address: register,
                value,
            } => {
                table.check_range(register, 1)?;
                table.set(usize::from(register), value);
                Self::echo(body)
            }

            ModbusRequest::WriteMultipleRegisters {
                start,
                quantity,
                values,
            } => {
                table.check_range(start, quantity)?;
                if usize::from(quantity) > MAX_WRITE_REGISTERS {
                    return Err(ModbusError::invalid_data(format!(
                        "Write quantity {} exceeds {}",
                        quantity, MAX_WRITE_REGISTERS
                    )));
                }
                let values = decode_register_values(values, quantity)?;
                table.write_range(start, &values)?;

                Ok(FrameBuilder::new(address)
                    .function_code(function.to_u8())?
                    .word(start)?
                    .word(quantity)?
                    .build())
            }
        }
    }

    /// Echo address, function and the four request payload bytes unchanged
    fn echo(body: &[u8]) -> ModbusResult<RtuFrame> {
        RtuFrame::from_slice(&body[..6])
    }
}
