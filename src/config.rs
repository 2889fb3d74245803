//! # Slave Configuration
//!
//! Line timing and protocol-task settings for an RTU slave.
//!
//! ## Inter-Character Timeout
//!
//! A frame ends after 3.5 character times of silence. With 11 bits per
//! character that is about 4 ms at 9600 baud. Above 19200 baud the timeout
//! is fixed at 1.75 ms.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use voltage_rtu_slave::SlaveConfig;
//!
//! let config = SlaveConfig::new()
//!     .with_slave_address(17)
//!     .with_baud_rate(19200)
//!     .with_packet_logging(true);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.inter_char_timeout(), Duration::from_micros(2002));
//! ```

use std::time::Duration;

use crate::constants::{
    BITS_PER_CHARACTER, DEFAULT_BAUD_RATE, DEFAULT_SLAVE_ADDRESS, DEFAULT_TRANSMIT_TIMEOUT_MS,
    FIXED_INTER_CHAR_TIMEOUT_US, FIXED_TIMING_BAUD_THRESHOLD, MAX_SLAVE_ADDRESS,
    MIN_SLAVE_ADDRESS,
};
use crate::data::MODBUS_DATA_BASE_ADDR;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;

/// Inter-character timeout (T3.5) for `baud_rate`.
///
/// `baud_rate` must be non-zero; see [`SlaveConfig::validate`].
pub fn frame_gap_for_baud(baud_rate: u32) -> Duration {
    if baud_rate > FIXED_TIMING_BAUD_THRESHOLD {
        return Duration::from_micros(FIXED_INTER_CHAR_TIMEOUT_US);
    }
    let char_time_us = BITS_PER_CHARACTER * 1_000_000 / u64::from(baud_rate.max(1));
    Duration::from_micros(char_time_us * 35 / 10)
}

/// RTU slave settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Initial slave address (1-247)
    pub slave_address: SlaveId,
    /// Line rate, used to derive the inter-character timeout
    pub baud_rate: u32,
    /// Explicit inter-character timeout, overriding the derived one
    pub inter_char_timeout: Option<Duration>,
    /// Bound on one response transmission
    pub transmit_timeout: Duration,
    /// First register of the application structure mirror
    pub register_base: usize,
    /// Hex-dump every frame at info level
    pub packet_logging: bool,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            baud_rate: DEFAULT_BAUD_RATE,
            inter_char_timeout: None,
            transmit_timeout: Duration::from_millis(DEFAULT_TRANSMIT_TIMEOUT_MS),
            register_base: MODBUS_DATA_BASE_ADDR,
            packet_logging: false,
        }
    }
}

impl SlaveConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial slave address.
    pub fn with_slave_address(mut self, address: SlaveId) -> Self {
        self.slave_address = address;
        self
    }

    /// Set the line rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the derived inter-character timeout.
    pub fn with_inter_char_timeout(mut self, timeout: Duration) -> Self {
        self.inter_char_timeout = Some(timeout);
        self
    }

    /// Set the transmit timeout.
    pub fn with_transmit_timeout(mut self, timeout: Duration) -> Self {
        self.transmit_timeout = timeout;
        self
    }

    /// Set the first register of the structure mirror.
    pub fn with_register_base(mut self, base: usize) -> Self {
        self.register_base = base;
        self
    }

    /// Enable or disable packet logging.
    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// Effective inter-character timeout.
    pub fn inter_char_timeout(&self) -> Duration {
        self.inter_char_timeout
            .unwrap_or_else(|| frame_gap_for_baud(self.baud_rate))
    }

    /// Check every setting.
    pub fn validate(&self) -> ModbusResult<()> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&self.slave_address) {
            return Err(ModbusError::configuration(format!(
                "Slave address {} outside {}-{}",
                self.slave_address, MIN_SLAVE_ADDRESS, MAX_SLAVE_ADDRESS
            )));
        }
        if self.baud_rate == 0 {
            return Err(ModbusError::configuration("Baud rate must be non-zero"));
        }
        if self.inter_char_timeout().is_zero() {
            return Err(ModbusError::configuration(
                "Inter-character timeout must be non-zero",
            ));
        }
        if self.transmit_timeout.is_zero() {
            return Err(ModbusError::configuration("Transmit timeout must be non-zero"));
        }
        Ok(())
    }
}
