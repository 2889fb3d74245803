//! Integration Tests for the RTU Slave
//!
//! Drive a spawned slave end to end: bytes in through a source, frames out
//! through a sink, application state shared with the test.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use voltage_rtu_slave::checksum;
use voltage_rtu_slave::{
    ChannelByteSink, ChannelByteSource, FrameBuilder, ModbusData, RtuSlave, SharedAppData,
    SlaveConfig, SlaveHandle, SlaveId, StreamByteSink, StreamByteSource, APP_VERSION,
};

const IDLE: Duration = Duration::from_millis(10);
const RESPONSE_WAIT: Duration = Duration::from_millis(300);
const SILENCE_WAIT: Duration = Duration::from_millis(100);

/// A master's view of the line
struct Line {
    bytes: mpsc::Sender<u8>,
    responses: mpsc::Receiver<Bytes>,
    handle: SlaveHandle,
    app: SharedAppData<ModbusData>,
}

impl Line {
    fn start(address: SlaveId, initial: ModbusData) -> Self {
        let (bytes, byte_rx) = mpsc::channel(1024);
        let (frame_tx, responses) = mpsc::channel(8);
        let app = SharedAppData::new(initial);

        let config = SlaveConfig::new()
            .with_slave_address(address)
            .with_inter_char_timeout(IDLE);
        let handle = RtuSlave::new(
            config,
            app.clone(),
            ChannelByteSource::new(byte_rx),
            ChannelByteSink::new(frame_tx),
        )
        .unwrap()
        .spawn();

        Self {
            bytes,
            responses,
            handle,
            app,
        }
    }

    /// Slave at address 1 over an all-zero table
    fn zeroed() -> Self {
        let mut data = ModbusData::default();
        data.version = 0;
        Self::start(1, data)
    }

    async fn send_raw(&self, frame: &[u8]) {
        for &b in frame {
            self.bytes.send(b).await.unwrap();
        }
    }

    /// Send a frame and wait for the response; `None` when the slave stays silent
    async fn request(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        self.send_raw(frame).await;
        match timeout(RESPONSE_WAIT, self.responses.recv()).await {
            Ok(Some(response)) => Some(response.to_vec()),
            _ => None,
        }
    }

    /// Send a frame that must not be answered
    async fn request_silent(&mut self, frame: &[u8]) {
        self.send_raw(frame).await;
        assert!(timeout(SILENCE_WAIT, self.responses.recv()).await.is_err());
    }
}

fn with_crc(body: &[u8]) -> Vec<u8> {
    let mut frame = body.to_vec();
    frame.extend_from_slice(&checksum::compute(body).to_le_bytes());
    frame
}

/// Test the read scenario against an all-zero table
#[tokio::test]
async fn test_read_two_registers_from_zeroed_table() {
    let mut line = Line::zeroed();

    let response = line
        .request(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B])
        .await
        .unwrap();

    assert_eq!(response, with_crc(&[0x01, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]));
    assert!(checksum::verify(&response));

    let stats = line.handle.shutdown().await.unwrap();
    assert_eq!(stats.responses_sent, 1);
}

/// Test write coil 10 ON: echo, register 10 = 1, visible to the application
#[tokio::test]
async fn test_write_coil_echoes_request() {
    let mut line = Line::zeroed();
    let request = with_crc(&[0x01, 0x05, 0x00, 0x0A, 0xFF, 0x00]);

    let response = line.request(&request).await.unwrap();
    assert_eq!(response, request);
    assert_eq!(line.handle.registers().lock().unwrap().get(10), 1);

    // Register 10 is the external analog input word
    assert_eq!(line.app.get().unwrap().solenoid_data.ext_ain, 1);

    line.handle.shutdown().await.unwrap();
}

/// Test unsupported function code 99
#[tokio::test]
async fn test_illegal_function_exception() {
    let mut line = Line::zeroed();

    let response = line.request(&with_crc(&[0x01, 99, 0x00, 0x00, 0x00, 0x01])).await.unwrap();
    assert_eq!(response, with_crc(&[0x01, 0xE3, 0x01]));

    let stats = line.handle.shutdown().await.unwrap();
    assert_eq!(stats.exceptions_sent, 1);
}

/// Test FC16 updating the application structure
#[tokio::test]
async fn test_write_multiple_reaches_application() {
    let mut line = Line::start(1, ModbusData::default());

    // EEPROM gains at registers 29-32
    let request = FrameBuilder::write_multiple_registers(1, 29, &[100, 20, 90, 0xFFFF]).unwrap();
    let response = line.request(request.as_slice()).await.unwrap();
    assert_eq!(response, with_crc(&[0x01, 0x10, 0x00, 0x1D, 0x00, 0x04]));

    let data = line.app.get().unwrap();
    assert_eq!(data.eeprom_data.sola_kp, 100);
    assert_eq!(data.eeprom_data.sola_ki, 20);
    assert_eq!(data.eeprom_data.solb_kp, 90);
    assert_eq!(data.eeprom_data.solb_ki, 0xFFFF);
    assert_eq!(data.version, APP_VERSION);

    line.handle.shutdown().await.unwrap();
}

/// Test that application updates are visible to the next read
#[tokio::test]
async fn test_application_state_visible_to_master() {
    let mut line = Line::start(1, ModbusData::default());

    line.app
        .update(|d| {
            d.solenoid_data.sola_measurement = 0x0321;
            d.solenoid_data.dip_switch = 0x0F;
            d.solenoid_data.status_sys = 0x01;
        })
        .unwrap();

    let request = FrameBuilder::read_holding_registers(1, 6, 8).unwrap();
    let response = line.request(request.as_slice()).await.unwrap();

    assert_eq!(response[2], 16);
    assert_eq!(&response[3..5], &[0x03, 0x21]);
    // dip_switch low byte, status_sys high byte of register 13
    assert_eq!(&response[17..19], &[0x01, 0x0F]);

    line.handle.shutdown().await.unwrap();
}

/// Test silent drops and recovery on the next frame
#[tokio::test]
async fn test_foreign_and_corrupted_frames_are_silent() {
    let mut line = Line::zeroed();

    line.request_silent(&with_crc(&[0x02, 0x03, 0x00, 0x00, 0x00, 0x01]))
        .await;
    line.request_silent(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0C])
        .await;
    line.request_silent(&[0x01, 0x03]).await;

    let response = line
        .request(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B])
        .await
        .unwrap();
    assert_eq!(response[1], 0x03);

    let stats = line.handle.shutdown().await.unwrap();
    assert_eq!(stats.foreign_address_drops, 1);
    assert_eq!(stats.crc_drops, 1);
    assert_eq!(stats.short_frame_drops, 1);
    assert_eq!(stats.frames_assembled, 4);
}

/// Test out-of-range exceptions leave the table untouched
#[tokio::test]
async fn test_out_of_range_requests() {
    let mut line = Line::zeroed();

    let response = line.request(&with_crc(&[0x01, 0x03, 0x00, 0x24, 0x00, 0x02])).await.unwrap();
    assert_eq!(response, with_crc(&[0x01, 0x83, 0x02]));

    let response = line.request(&with_crc(&[0x01, 0x06, 0x00, 0x25, 0x12, 0x34])).await.unwrap();
    assert_eq!(response, with_crc(&[0x01, 0x86, 0x02]));

    let response = line.request(&with_crc(&[0x01, 0x05, 0x00, 0x01, 0x12, 0x34])).await.unwrap();
    assert_eq!(response, with_crc(&[0x01, 0x85, 0x03]));

    assert!(line.handle.registers().snapshot().unwrap().iter().all(|&v| v == 0));
    line.handle.shutdown().await.unwrap();
}

/// Test runtime address change through the handle
#[tokio::test]
async fn test_address_change_at_runtime() {
    let mut line = Line::zeroed();
    line.handle.address().set(17).unwrap();

    line.request_silent(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B])
        .await;

    let request = FrameBuilder::read_holding_registers(17, 0, 1).unwrap();
    let response = line.request(request.as_slice()).await.unwrap();
    assert_eq!(response, with_crc(&[17, 0x03, 0x02, 0x00, 0x00]));

    line.handle.shutdown().await.unwrap();
}

/// Test that an oversized burst is discarded and the line recovers
#[tokio::test]
async fn test_overflow_recovery() {
    let mut line = Line::zeroed();

    line.request_silent(&[0xAA; 300]).await;

    let response = line
        .request(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B])
        .await
        .unwrap();
    assert_eq!(response, with_crc(&[0x01, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]));

    let stats = line.handle.shutdown().await.unwrap();
    assert_eq!(stats.overflows, 1);
    assert_eq!(stats.responses_sent, 1);
}

/// Test that closing the byte source ends the task
#[tokio::test]
async fn test_source_close_ends_task() {
    let line = Line::zeroed();
    let Line { bytes, handle, .. } = line;
    drop(bytes);

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.frames_assembled, 0);
}

/// Test a slave running over an in-memory byte stream
#[tokio::test]
async fn test_stream_transport_end_to_end() {
    let (master, slave_end) = tokio::io::duplex(256);
    let (reader, writer) = tokio::io::split(slave_end);

    let mut data = ModbusData::default();
    data.version = 0;
    let handle = RtuSlave::new(
        SlaveConfig::new()
            .with_slave_address(1)
            .with_inter_char_timeout(IDLE),
        SharedAppData::new(data),
        StreamByteSource::new(reader),
        StreamByteSink::new(writer),
    )
    .unwrap()
    .spawn();

    let (mut master_rx, mut master_tx) = tokio::io::split(master);
    master_tx
        .write_all(&[0x01, 0x06, 0x00, 0x03, 0xAB, 0xCD])
        .await
        .unwrap();
    master_tx
        .write_all(&checksum::compute(&[0x01, 0x06, 0x00, 0x03, 0xAB, 0xCD]).to_le_bytes())
        .await
        .unwrap();

    let mut response = [0u8; 8];
    timeout(RESPONSE_WAIT, master_rx.read_exact(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.to_vec(), with_crc(&[0x01, 0x06, 0x00, 0x03, 0xAB, 0xCD]));
    assert_eq!(handle.registers().lock().unwrap().get(3), 0xABCD);

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.responses_sent, 1);
}
