//! # Error Handling
//!
//! Error types for the RTU slave frame engine.
//!
//! ## Error Categories
//!
//! ### Transport Errors
//! - **I/O Errors**: serial port or stream failures
//! - **Timeout Errors**: bounded transmit that did not complete
//! - **Connection Closed**: the byte source or sink went away
//!
//! ### Protocol Errors
//! - **Frame / CRC Errors**: malformed or corrupted inbound frames
//! - **Invalid Function / Address / Data**: requests the slave cannot honour;
//!   these become Modbus exception frames, see [`ModbusError::to_exception`]
//!
//! ### System Errors
//! - **Configuration Errors**: invalid slave configuration
//! - **Internal Errors**: poisoned locks, task join failures
//!
//! ## Exception Mapping
//!
//! ```rust
//! use voltage_rtu_slave::{ModbusError, ModbusException};
//!
//! let err = ModbusError::invalid_address(40, 2);
//! assert_eq!(err.to_exception(), Some(ModbusException::IllegalDataAddress));
//!
//! let err = ModbusError::io("port unplugged");
//! assert_eq!(err.to_exception(), None);
//! ```

use thiserror::Error;

use crate::protocol::ModbusException;

/// Result type alias for Modbus operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus slave error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// I/O related errors (serial port, stream)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Timeout errors
    ///
    /// Includes context about which operation timed out and the timeout duration.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The byte source or byte sink has been closed
    #[error("Connection closed: {message}")]
    ConnectionClosed { message: String },

    /// Frame parsing errors
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// CRC validation failure
    #[error("CRC validation failed: expected={expected:04X}, actual={actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Unsupported function code
    #[error("Invalid function code: {code}")]
    InvalidFunction { code: u8 },

    /// Address range outside the register table
    #[error("Invalid address: start={start}, count={count}")]
    InvalidAddress { start: u16, count: u16 },

    /// Data value the slave cannot accept
    ///
    /// # Examples
    /// - Coil value not 0x0000 or 0xFF00
    /// - Request payload shorter than its function requires
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal errors (should not occur in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ModbusError {
    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a connection closed error
    pub fn connection_closed<S: Into<String>>(message: S) -> Self {
        Self::ConnectionClosed {
            message: message.into(),
        }
    }

    /// Create a frame error
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error
    pub fn crc_mismatch(expected: u16, actual: u16) -> Self {
        Self::CrcMismatch { expected, actual }
    }

    /// Create an invalid function error
    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    /// Create an invalid address error
    pub fn invalid_address(start: u16, count: u16) -> Self {
        Self::InvalidAddress { start, count }
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Exception the master should receive for this error.
    ///
    /// Returns `None` for local faults, which never reach the wire.
    pub fn to_exception(&self) -> Option<ModbusException> {
        match self {
            Self::InvalidFunction { .. } => Some(ModbusException::IllegalFunction),
            Self::InvalidAddress { .. } => Some(ModbusException::IllegalDataAddress),
            Self::InvalidData { .. } => Some(ModbusException::IllegalDataValue),
            _ => None,
        }
    }

    /// Check if the error is recoverable (the next frame cycle may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::CrcMismatch { .. } | Self::Frame { .. }
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
                Self::connection_closed(err.to_string())
            }
            _ => Self::io(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("Operation timeout", 0)
    }
}
