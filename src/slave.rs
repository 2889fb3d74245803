//! # RTU Slave Task
//!
//! Wires the frame engine together and runs it as one sequential task:
//!
//! ```text
//! ByteSource ─► FrameAssembler ─(idle)─► snapshot ─► Dispatcher ─► commit ─► TransmitAssembler ─► ByteSink
//! ```
//!
//! The only suspension points are the wait for the next byte (which a
//! shutdown signal interrupts) and the bounded transmit. A frame cycle that
//! has started always runs to completion.
//!
//! # Example
//!
//! ```rust,no_run
//! use tokio::sync::mpsc;
//! use voltage_rtu_slave::{
//!     ChannelByteSink, ChannelByteSource, ModbusData, RtuSlave, SharedAppData, SlaveConfig,
//! };
//!
//! # async fn example() -> voltage_rtu_slave::ModbusResult<()> {
//! let (_rx_tx, rx) = mpsc::channel(256);
//! let (tx, _tx_rx) = mpsc::channel(8);
//! let app = SharedAppData::new(ModbusData::default());
//!
//! let slave = RtuSlave::new(
//!     SlaveConfig::new().with_slave_address(1),
//!     app.clone(),
//!     ChannelByteSource::new(rx),
//!     ChannelByteSink::new(tx),
//! )?;
//!
//! let handle = slave.spawn();
//! // ... application runs, master polls ...
//! let stats = handle.shutdown().await?;
//! println!("responses sent: {}", stats.responses_sent);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::assembler::{ByteOutcome, FrameAssembler};
use crate::config::SlaveConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher, DropReason, SlaveAddress};
use crate::error::{ModbusError, ModbusResult};
use crate::logging::PacketLogger;
use crate::register::RegisterStore;
use crate::sync::{RegisterMapped, SharedAppData, Synchronizer};
use crate::transmit::TransmitAssembler;
use crate::transport::{ByteSink, ByteSource, RxEvent};

/// Upper bound on the retry delay after a failing source read
const MAX_SOURCE_BACKOFF: Duration = Duration::from_secs(1);

/// Slave runtime statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlaveStats {
    /// Frames delimited by an idle gap
    pub frames_assembled: u64,
    /// Responses handed to the sink, exceptions included
    pub responses_sent: u64,
    /// Exception responses among `responses_sent`
    pub exceptions_sent: u64,
    pub foreign_address_drops: u64,
    pub crc_drops: u64,
    pub short_frame_drops: u64,
    /// Partial frames discarded on buffer overflow
    pub overflows: u64,
    pub transmit_failures: u64,
    pub source_errors: u64,
    /// Lock poisoning and other local faults
    pub internal_errors: u64,
}

/// Modbus RTU slave bound to one application structure and one line.
pub struct RtuSlave<T, Src, Snk> {
    config: SlaveConfig,
    app: SharedAppData<T>,
    registers: RegisterStore,
    dispatcher: Dispatcher,
    synchronizer: Synchronizer,
    assembler: FrameAssembler,
    transmitter: TransmitAssembler,
    logger: PacketLogger,
    source: Src,
    sink: Snk,
    stats: SlaveStats,
    shared_stats: Arc<Mutex<SlaveStats>>,
}

impl<T, Src, Snk> RtuSlave<T, Src, Snk>
where
    T: RegisterMapped + Send + 'static,
    Src: ByteSource + 'static,
    Snk: ByteSink + 'static,
{
    /// Create a slave with a zero-filled register table sized to cover the
    /// application structure at `config.register_base`.
    pub fn new(
        config: SlaveConfig,
        app: SharedAppData<T>,
        source: Src,
        sink: Snk,
    ) -> ModbusResult<Self> {
        config.validate()?;

        let registers = RegisterStore::new(config.register_base + T::WORD_COUNT);
        let address = SlaveAddress::new(config.slave_address)?;
        let logger = PacketLogger::new(config.packet_logging);

        info!(
            "RTU slave {} configured: {} registers, {} baud, T3.5={:?}",
            config.slave_address,
            registers.size(),
            config.baud_rate,
            config.inter_char_timeout()
        );

        Ok(Self {
            dispatcher: Dispatcher::new(address, registers.clone()),
            synchronizer: Synchronizer::new(config.register_base),
            assembler: FrameAssembler::new(),
            transmitter: TransmitAssembler::new(config.transmit_timeout, logger),
            logger,
            config,
            app,
            registers,
            source,
            sink,
            stats: SlaveStats::default(),
            shared_stats: Arc::new(Mutex::new(SlaveStats::default())),
        })
    }

    /// Register store shared with application tasks
    pub fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    /// Runtime-configurable slave address
    pub fn address(&self) -> &SlaveAddress {
        self.dispatcher.address()
    }

    /// Statistics so far
    pub fn stats(&self) -> &SlaveStats {
        &self.stats
    }

    /// Configuration in effect
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Feed one source event through the engine.
    ///
    /// A timeout with bytes buffered runs a full frame cycle.
    pub async fn handle_event(&mut self, event: RxEvent) {
        match event {
            RxEvent::Byte(byte) => {
                if self.assembler.push_byte(byte) == ByteOutcome::Overflow {
                    self.stats.overflows += 1;
                    self.publish_stats().await;
                }
            }
            RxEvent::Timeout => {
                if self.assembler.on_idle_timeout().is_some() {
                    self.process_frame().await;
                    self.assembler.complete();
                    self.publish_stats().await;
                }
            }
        }
    }

    /// Snapshot, dispatch, commit, transmit.
    async fn process_frame(&mut self) {
        self.stats.frames_assembled += 1;

        let (snapshot, outcome, commit) = {
            let request = self.assembler.frame();
            if let Some(&target) = request.first() {
                self.logger.log_rx(target, request);
            }

            let snapshot = self.synchronizer.snapshot(&self.app, &self.registers);
            let outcome = self.dispatcher.dispatch(request);
            let commit = self.synchronizer.commit(&self.app, &self.registers);
            (snapshot, outcome, commit)
        };

        if let Err(e) = snapshot {
            self.record_internal_error("snapshot", &e);
        }
        if let Err(e) = commit {
            self.record_internal_error("commit", &e);
        }

        let response = match outcome {
            Ok(DispatchOutcome::Response(response)) => response,
            Ok(DispatchOutcome::Dropped(reason)) => {
                self.record_drop(reason);
                return;
            }
            Err(e) => {
                self.record_internal_error("dispatch", &e);
                return;
            }
        };

        let address = self.dispatcher.address().get();
        match self
            .transmitter
            .transmit(&mut self.sink, address, response.as_slice())
            .await
        {
            Ok(()) => {
                self.stats.responses_sent += 1;
                if response.is_exception() {
                    self.stats.exceptions_sent += 1;
                }
            }
            Err(_) => self.stats.transmit_failures += 1,
        }
    }

    fn record_drop(&mut self, reason: DropReason) {
        debug!("Frame dropped: {:?}", reason);
        match reason {
            DropReason::Empty => {}
            DropReason::ForeignAddress { .. } => self.stats.foreign_address_drops += 1,
            DropReason::TooShort { .. } => self.stats.short_frame_drops += 1,
            DropReason::CrcMismatch { .. } => self.stats.crc_drops += 1,
        }
    }

    fn record_internal_error(&mut self, phase: &str, err: &ModbusError) {
        self.stats.internal_errors += 1;
        error!("Frame cycle {} failed: {}", phase, err);
    }

    async fn publish_stats(&mut self) {
        let stats = self.stats.clone();
        let shared = Arc::clone(&self.shared_stats);
        *shared.lock().await = stats;
    }

    /// Run until `shutdown` fires, its sender is dropped, or the byte source
    /// closes. Returns the final statistics.
    ///
    /// Recoverable source errors are counted and retried after a delay that
    /// starts at the inter-character timeout and doubles up to one second.
    /// Any other source error ends the task with that error.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ModbusResult<SlaveStats> {
        let idle = self.config.inter_char_timeout();
        let mut backoff = idle;
        info!("RTU slave {} running", self.dispatcher.address().get());

        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping RTU slave");
                    break;
                }
                event = self.source.next_byte_or_timeout(idle) => event,
            };

            match event {
                Ok(event) => {
                    backoff = idle;
                    self.handle_event(event).await;
                }
                Err(ModbusError::ConnectionClosed { message }) => {
                    info!("Byte source closed ({}), stopping RTU slave", message);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    self.stats.source_errors += 1;
                    warn!("Byte source error: {}, retrying in {:?}", e, backoff);
                    self.publish_stats().await;

                    tokio::select! {
                        _ = shutdown.recv() => {
                            info!("Shutdown signal received, stopping RTU slave");
                            break;
                        }
                        _ = sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_SOURCE_BACKOFF.max(idle));
                }
                Err(e) => {
                    self.stats.source_errors += 1;
                    error!("Byte source failed: {}", e);
                    self.publish_stats().await;
                    return Err(e);
                }
            }
        }

        self.publish_stats().await;
        Ok(self.stats)
    }

    /// Run on a new tokio task.
    pub fn spawn(self) -> SlaveHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let address = self.dispatcher.address().clone();
        let registers = self.registers.clone();
        let stats = Arc::clone(&self.shared_stats);

        let task = tokio::spawn(self.run(shutdown_rx));

        SlaveHandle {
            shutdown_tx,
            task,
            address,
            registers,
            stats,
        }
    }
}

/// Control handle for a spawned slave.
///
/// Dropping the handle stops the slave at its next wait.
pub struct SlaveHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<ModbusResult<SlaveStats>>,
    address: SlaveAddress,
    registers: RegisterStore,
    stats: Arc<Mutex<SlaveStats>>,
}

impl SlaveHandle {
    /// Runtime-configurable slave address
    pub fn address(&self) -> &SlaveAddress {
        &self.address
    }

    /// Register store
    pub fn registers(&self) -> &RegisterStore {
        &self.registers
    }

    /// Statistics as of the last completed frame cycle
    pub async fn stats(&self) -> SlaveStats {
        self.stats.lock().await.clone()
    }

    /// Check if the task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the slave after any in-progress frame cycle and return its
    /// final statistics.
    pub async fn shutdown(self) -> ModbusResult<SlaveStats> {
        // The task may already be gone
        let _ = self.shutdown_tx.send(());
        self.task
            .await
            .map_err(|e| ModbusError::internal(format!("RTU slave task failed: {}", e)))?
    }
}
