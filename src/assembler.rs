//! Frame assembler
//!
//! RTU frames carry no length field: a frame ends when the line stays idle
//! for the inter-character timeout. The assembler accumulates bytes until
//! that idle signal arrives, then hands the buffered frame to the caller.
//!
//! ```text
//!            byte / append            idle, len > 0
//!   ┌──────────────────────┐   ┌──────────────────────────┐
//!   │                      ▼   │                          ▼
//!   └──── Accumulating ────────┘                    FrameReady
//!              ▲                                          │
//!              └──────────── complete() ──────────────────┘
//! ```

use tracing::warn;

use crate::frame::RtuFrame;

/// Assembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for bytes or for the idle timeout
    Accumulating,
    /// A complete frame is buffered and awaits processing
    FrameReady,
}

/// Result of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOutcome {
    /// Byte appended to the candidate frame
    Stored,
    /// Buffer was full: the partial frame and this byte were discarded
    Overflow,
}

/// Reassembles request frames from a byte stream plus idle signals.
///
/// Single frame in flight; not re-entrant.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buffer: RtuFrame,
    state: AssemblerState,
    overflows: u64,
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self {
            buffer: RtuFrame::new(),
            state: AssemblerState::Accumulating,
            overflows: 0,
        }
    }

    /// Feed one received byte.
    pub fn push_byte(&mut self, byte: u8) -> ByteOutcome {
        if self.buffer.is_full() {
            self.overflows += 1;
            warn!(
                "RTU frame buffer overflow after {} bytes, discarding partial frame",
                self.buffer.len()
            );
            self.buffer.clear();
            return ByteOutcome::Overflow;
        }

        // is_full was checked above
        let _ = self.buffer.push(byte);
        ByteOutcome::Stored
    }

    /// Signal that the line went idle.
    ///
    /// Returns the buffered frame when there is one; an idle line with an
    /// empty buffer is a no-op.
    pub fn on_idle_timeout(&mut self) -> Option<&[u8]> {
        if self.buffer.is_empty() {
            return None;
        }
        self.state = AssemblerState::FrameReady;
        Some(self.buffer.as_slice())
    }

    /// Finish the current cycle, whatever its outcome, and start accumulating
    /// the next frame.
    pub fn complete(&mut self) {
        self.buffer.clear();
        self.state = AssemblerState::Accumulating;
    }

    /// Current state
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Bytes buffered so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered bytes
    pub fn frame(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Number of overflow recoveries since creation
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
