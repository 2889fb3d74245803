//! # Voltage RTU Slave - Modbus RTU Slave Frame Engine
//!
//! A Modbus RTU slave responder for device controllers: it reassembles
//! request frames from a serial byte stream using inter-character timing,
//! validates and executes them against an in-memory register table, and
//! emits correctly framed responses. The register table is a live mirror of
//! an application data structure, so a supervisory master (e.g. a PLC) can
//! read and write device state directly.
//!
//! ## Features
//!
//! - **Timing-Based Framing**: T3.5 idle detection with overflow recovery
//! - **Exception Semantics**: standard Modbus exceptions 1, 2 and 3
//! - **Struct Mirroring**: explicit word maps via [`RegisterMapped`]
//! - **Async Runtime**: one tokio task, pluggable byte source and sink
//! - **Built-in Monitoring**: per-slave statistics and packet hex dumps
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Slave |
//! |------|----------|-------|
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x05 | Write Single Coil (register value 0/1) | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! Any other function code is answered with exception 1 (Illegal Function).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_rtu_slave::{
//!     ModbusData, ModbusResult, RtuSlave, SharedAppData, SlaveConfig, StreamByteSink,
//!     StreamByteSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let config = SlaveConfig::new().with_slave_address(1).with_baud_rate(9600);
//!
//!     // Any byte stream works; a line bridged to stdin/stdout here
//!     let source = StreamByteSource::new(tokio::io::stdin());
//!     let sink = StreamByteSink::new(tokio::io::stdout());
//!
//!     // Shared with the control loop
//!     let app = SharedAppData::new(ModbusData::default());
//!
//!     let handle = RtuSlave::new(config, app.clone(), source, sink)?.spawn();
//!
//!     app.update(|data| data.solenoid_data.sola_measurement = 512)?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! With the `rtu` feature, `open_serial` returns a source/sink pair for a
//! real serial port.

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus RTU protocol constants
pub mod constants;

/// Stack-allocated RTU frame buffer and builder
pub mod frame;

/// Modbus CRC16
pub mod checksum;

/// Function codes, exception codes and request decoding
pub mod protocol;

// ============================================================================
// Slave engine
// ============================================================================

/// Holding register table behind an exclusive lock
pub mod register;

/// Struct/register synchronization
pub mod sync;

/// Application data structure mirrored into the registers
pub mod data;

/// Timing-based frame reassembly
pub mod assembler;

/// Request validation and execution
pub mod dispatcher;

/// Bounded response transmission
pub mod transmit;

/// Byte source and sink collaborators
pub mod transport;

/// Slave configuration
pub mod config;

/// The protocol task
pub mod slave;

/// Logging setup and packet dumps
pub mod logging;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_rtu_slave::tokio) ===
pub use tokio;

// === Core slave API ===
pub use config::SlaveConfig;
pub use slave::{RtuSlave, SlaveHandle, SlaveStats};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use frame::{FrameBuilder, RtuFrame};
pub use protocol::{ModbusException, ModbusFunction, ModbusRequest, SlaveId};

// === Engine components ===
pub use assembler::FrameAssembler;
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason, SlaveAddress};
pub use register::{RegisterStore, RegisterTable};
pub use sync::{RegisterMapped, SharedAppData, Synchronizer};
pub use transmit::TransmitAssembler;

// === Application data ===
pub use data::{EepromData, ModbusData, PiController, SolenoidData, APP_VERSION};

// === Collaborators ===
pub use transport::{
    ByteSink, ByteSource, ChannelByteSink, ChannelByteSource, RxEvent, StreamByteSink,
    StreamByteSource,
};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    DEFAULT_SLAVE_ADDRESS, MAX_READ_REGISTERS, MAX_RTU_FRAME_SIZE, MAX_WRITE_REGISTERS,
};

#[cfg(feature = "rtu")]
pub use transport::open_serial;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Voltage RTU Slave v{} - Modbus RTU slave frame engine", VERSION)
}
