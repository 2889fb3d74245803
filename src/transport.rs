//! # Byte Transport
//!
//! The slave is written against two narrow collaborators:
//!
//! - [`ByteSource`]: yields one received byte at a time, or
//!   [`RxEvent::Timeout`] when the line stays idle for the inter-character
//!   timeout. The idle timer restarts with every call, so it measures the
//!   gap after the most recent byte.
//! - [`ByteSink`]: writes a complete response frame.
//!
//! Implementations are provided for tokio channels (tests, simulations and
//! bridging from a UART interrupt handler) and for any `AsyncRead` /
//! `AsyncWrite` stream. With the `rtu` feature, [`open_serial`] opens a
//! serial port as a source/sink pair.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use voltage_rtu_slave::transport::{ByteSource, ChannelByteSource, RxEvent};
//!
//! # async fn example() -> voltage_rtu_slave::ModbusResult<()> {
//! let (tx, rx) = mpsc::channel(256);
//! let mut source = ChannelByteSource::new(rx);
//! tx.send(0x01).await.ok();
//!
//! match source.next_byte_or_timeout(Duration::from_millis(4)).await? {
//!     RxEvent::Byte(b) => println!("received {:02X}", b),
//!     RxEvent::Timeout => println!("line idle"),
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::error::{ModbusError, ModbusResult};

/// Event delivered by a [`ByteSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxEvent {
    /// One byte arrived
    Byte(u8),
    /// No byte arrived within the idle window
    Timeout,
}

/// Source of received bytes and idle signals.
///
/// An error ends the slave task; a closed source is reported as
/// [`ModbusError::ConnectionClosed`].
pub trait ByteSource: Send {
    /// Wait up to `idle` for the next byte
    fn next_byte_or_timeout(
        &mut self,
        idle: Duration,
    ) -> impl Future<Output = ModbusResult<RxEvent>> + Send;
}

/// Destination for complete response frames
pub trait ByteSink: Send {
    /// Write the whole frame
    fn transmit(&mut self, frame: &[u8]) -> impl Future<Output = ModbusResult<()>> + Send;
}

/// [`ByteSource`] fed by a channel of single bytes
#[derive(Debug)]
pub struct ChannelByteSource {
    rx: mpsc::Receiver<u8>,
}

impl ChannelByteSource {
    pub fn new(rx: mpsc::Receiver<u8>) -> Self {
        Self { rx }
    }
}

impl ByteSource for ChannelByteSource {
    async fn next_byte_or_timeout(&mut self, idle: Duration) -> ModbusResult<RxEvent> {
        match timeout(idle, self.rx.recv()).await {
            Ok(Some(byte)) => Ok(RxEvent::Byte(byte)),
            Ok(None) => Err(ModbusError::connection_closed("Byte channel closed")),
            Err(_) => Ok(RxEvent::Timeout),
        }
    }
}

/// [`ByteSink`] delivering each frame as one channel message
#[derive(Debug, Clone)]
pub struct ChannelByteSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelByteSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }
}

impl ByteSink for ChannelByteSink {
    async fn transmit(&mut self, frame: &[u8]) -> ModbusResult<()> {
        self.tx
            .send(Bytes::copy_from_slice(frame))
            .await
            .map_err(|_| ModbusError::connection_closed("Frame channel closed"))
    }
}

const STREAM_READ_CHUNK: usize = 64;

/// [`ByteSource`] over any async reader.
///
/// Bytes are read in chunks and handed out one at a time; buffered bytes
/// are returned without waiting.
#[derive(Debug)]
pub struct StreamByteSource<R> {
    reader: R,
    buf: [u8; STREAM_READ_CHUNK],
    pos: usize,
    filled: usize,
}

impl<R: AsyncRead + Unpin + Send> StreamByteSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: [0; STREAM_READ_CHUNK],
            pos: 0,
            filled: 0,
        }
    }

    /// Recover the underlying reader; unread buffered bytes are lost
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin + Send> ByteSource for StreamByteSource<R> {
    async fn next_byte_or_timeout(&mut self, idle: Duration) -> ModbusResult<RxEvent> {
        if self.pos < self.filled {
            let byte = self.buf[self.pos];
            self.pos += 1;
            return Ok(RxEvent::Byte(byte));
        }

        match timeout(idle, self.reader.read(&mut self.buf)).await {
            Ok(Ok(0)) => Err(ModbusError::connection_closed("Stream reached end of file")),
            Ok(Ok(n)) => {
                self.filled = n;
                self.pos = 1;
                Ok(RxEvent::Byte(self.buf[0]))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(RxEvent::Timeout),
        }
    }
}

/// [`ByteSink`] over any async writer; every frame is flushed
#[derive(Debug)]
pub struct StreamByteSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> StreamByteSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ByteSink for StreamByteSink<W> {
    async fn transmit(&mut self, frame: &[u8]) -> ModbusResult<()> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Serial port halves as returned by [`open_serial`]
#[cfg(feature = "rtu")]
pub type SerialSource = StreamByteSource<tokio::io::ReadHalf<tokio_serial::SerialStream>>;

#[cfg(feature = "rtu")]
pub type SerialSink = StreamByteSink<tokio::io::WriteHalf<tokio_serial::SerialStream>>;

/// Open a serial port at `baud_rate`, 8 data bits, no parity, 1 stop bit.
#[cfg(feature = "rtu")]
pub fn open_serial(port: &str, baud_rate: u32) -> ModbusResult<(SerialSource, SerialSink)> {
    let builder = tokio_serial::new(port, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None);

    let stream = tokio_serial::SerialStream::open(&builder)
        .map_err(|e| ModbusError::io(format!("Failed to open serial port {}: {}", port, e)))?;

    tracing::info!("Opened serial port {} at {} baud (8N1)", port, baud_rate);

    let (reader, writer) = tokio::io::split(stream);
    Ok((StreamByteSource::new(reader), StreamByteSink::new(writer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const IDLE: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_channel_source_bytes_then_timeout() {
        let (tx, rx) = mpsc::channel(8);
        let mut source = ChannelByteSource::new(rx);

        tx.send(0x01).await.unwrap();
        tx.send(0x03).await.unwrap();

        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x01));
        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x03));
        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Timeout);
    }

    #[tokio::test]
    async fn test_channel_source_closed() {
        let (tx, rx) = mpsc::channel(8);
        let mut source = ChannelByteSource::new(rx);
        drop(tx);

        let err = source.next_byte_or_timeout(IDLE).await.unwrap_err();
        assert!(matches!(err, ModbusError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_whole_frame() {
        let (tx, mut rx) = mpsc::channel(2);
        let mut sink = ChannelByteSink::new(tx);

        sink.transmit(&[0x01, 0x83, 0x02, 0xC0, 0xF1]).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(&frame[..], &[0x01, 0x83, 0x02, 0xC0, 0xF1]);

        drop(rx);
        assert!(sink.transmit(&[0x01]).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_source_splits_chunks() {
        let mock = Builder::new().read(&[0x01, 0x06]).read(&[0x00]).build();
        let mut source = StreamByteSource::new(mock);

        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x01));
        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x06));
        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x00));

        let err = source.next_byte_or_timeout(IDLE).await.unwrap_err();
        assert!(matches!(err, ModbusError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn test_stream_source_idle_gap() {
        let mock = Builder::new()
            .read(&[0x11])
            .wait(Duration::from_millis(100))
            .read(&[0x22])
            .build();
        let mut source = StreamByteSource::new(mock);

        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Byte(0x11));
        assert_eq!(source.next_byte_or_timeout(IDLE).await.unwrap(), RxEvent::Timeout);

        let mut next = source.next_byte_or_timeout(IDLE).await.unwrap();
        while next == RxEvent::Timeout {
            next = source.next_byte_or_timeout(IDLE).await.unwrap();
        }
        assert_eq!(next, RxEvent::Byte(0x22));
    }

    #[tokio::test]
    async fn test_stream_sink_writes_frame() {
        let mock = Builder::new().write(&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03]).build();
        let mut sink = StreamByteSink::new(mock);
        sink.transmit(&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03]).await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_sink_io_error() {
        let mock = Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::Other, "line fault"))
            .build();
        let mut sink = StreamByteSink::new(mock);
        let err = sink.transmit(&[0x01]).await.unwrap_err();
        assert!(matches!(err, ModbusError::Io { .. }));
    }
}
