//! Transmit assembler
//!
//! Hands a finished, CRC-terminated response to the byte sink as one block,
//! bounded by the transmit timeout. A failed or timed-out transmit is
//! reported to the caller, which moves on to the next frame cycle.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::error::{ModbusError, ModbusResult};
use crate::logging::PacketLogger;
use crate::protocol::SlaveId;
use crate::transport::ByteSink;

/// Drains response frames to a [`ByteSink`]
#[derive(Debug, Clone, Copy)]
pub struct TransmitAssembler {
    timeout: Duration,
    logger: PacketLogger,
}

impl TransmitAssembler {
    pub fn new(timeout: Duration, logger: PacketLogger) -> Self {
        Self { timeout, logger }
    }

    /// Transmit timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write `frame` to `sink`. An empty frame is not transmitted.
    pub async fn transmit<S: ByteSink>(
        &self,
        sink: &mut S,
        slave: SlaveId,
        frame: &[u8],
    ) -> ModbusResult<()> {
        if frame.is_empty() {
            return Ok(());
        }

        self.logger.log_tx(slave, frame);

        match timeout(self.timeout, sink.transmit(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Failed to transmit {}-byte response: {}", frame.len(), e);
                Err(e)
            }
            Err(_) => {
                warn!(
                    "Transmit of {}-byte response timed out after {:?}",
                    frame.len(),
                    self.timeout
                );
                Err(ModbusError::timeout(
                    "transmit response",
                    self.timeout.as_millis() as u64,
                ))
            }
        }
    }
}
