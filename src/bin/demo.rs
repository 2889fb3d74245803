//! Voltage RTU Slave Demo
//!
//! Runs an RTU slave against an in-process simulated master, with a
//! simulated control loop updating the application structure:
//! - Line timing derived from the baud rate
//! - Read, write and exception exchanges, printed as hex
//! - Slave statistics on shutdown
//!
//! Usage: cargo run --bin demo
//! With a serial port: cargo run --features rtu --bin demo -- /dev/ttyUSB0 [slave_id]

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use voltage_rtu_slave::logging::{self, format_hex_packet};
use voltage_rtu_slave::{
    ChannelByteSink, ChannelByteSource, FrameBuilder, ModbusData, ModbusResult, RtuFrame,
    RtuSlave, SharedAppData, SlaveConfig, SlaveId,
};

const DEMO_SLAVE_ID: SlaveId = 1;

/// Write a request byte by byte, then wait for the slave's answer.
async fn exchange(
    line: &mpsc::Sender<u8>,
    responses: &mut mpsc::Receiver<bytes::Bytes>,
    request: &RtuFrame,
) -> Option<bytes::Bytes> {
    println!("    -> {}", format_hex_packet(request.as_slice()));
    for &b in request.as_slice() {
        if line.send(b).await.is_err() {
            return None;
        }
    }

    match timeout(Duration::from_millis(200), responses.recv()).await {
        Ok(Some(response)) => {
            println!("    <- {}", format_hex_packet(&response));
            Some(response)
        }
        _ => {
            println!("    <- (no response)");
            None
        }
    }
}

/// Stand-in for the solenoid control loop: drifts the measurements.
fn spawn_control_loop(app: SharedAppData<ModbusData>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick: u16 = 0;
        loop {
            tick = tick.wrapping_add(1);
            let updated = app.update(|data| {
                let solenoid = &mut data.solenoid_data;
                let ripple = tick % 10;
                solenoid.sola_measurement = solenoid.sola_setpoint.saturating_sub(5).wrapping_add(ripple);
                solenoid.solb_measurement = solenoid.solb_setpoint.saturating_sub(5).wrapping_add(ripple);
            });
            if updated.is_err() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
}

async fn simulated_line() -> ModbusResult<()> {
    println!("🔌 Simulated line (in-process master)");
    println!("--------------------------------------");

    let (line_tx, line_rx) = mpsc::channel(512);
    let (resp_tx, mut resp_rx) = mpsc::channel(8);

    let mut initial = ModbusData::default();
    initial.solenoid_data.sola_setpoint = 1000;
    initial.solenoid_data.solb_setpoint = 800;
    let app = SharedAppData::new(initial);
    let control = spawn_control_loop(app.clone());

    let config = SlaveConfig::new()
        .with_slave_address(DEMO_SLAVE_ID)
        .with_packet_logging(true);
    let handle = RtuSlave::new(
        config,
        app.clone(),
        ChannelByteSource::new(line_rx),
        ChannelByteSink::new(resp_tx),
    )?
    .spawn();

    println!("\n  📖 FC03 read version and solenoid block (registers 0-14):");
    if let Some(response) = exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::read_holding_registers(DEMO_SLAVE_ID, 0, 15)?,
    )
    .await
    {
        let words: Vec<u16> = response[3..response.len() - 2]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        if words.len() >= 7 {
            println!(
                "    version={} sola_setpoint={} sola_measurement={}",
                words[0], words[5], words[6]
            );
        }
    }

    println!("\n  ✏️  FC06 write solenoid A setpoint = 1200 (register 5):");
    exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::write_single_register(DEMO_SLAVE_ID, 5, 1200)?,
    )
    .await;

    println!("\n  ✏️  FC16 write PI gains (registers 17-20):");
    exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::write_multiple_registers(DEMO_SLAVE_ID, 17, &[120, 15, 110, 12])?,
    )
    .await;

    println!("\n  🔘 FC05 coil 10 ON:");
    exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::write_single_coil(DEMO_SLAVE_ID, 10, true)?,
    )
    .await;

    println!("\n  ⚠️  FC03 past the end of the table (exception 2):");
    exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::read_holding_registers(DEMO_SLAVE_ID, 36, 2)?,
    )
    .await;

    println!("\n  🔕 Request for slave 2 (silently dropped):");
    exchange(
        &line_tx,
        &mut resp_rx,
        &FrameBuilder::read_holding_registers(2, 0, 1)?,
    )
    .await;

    let snapshot = app.get()?;
    println!("\n  🧠 Application view after the exchanges:");
    println!("    sola_setpoint = {}", snapshot.solenoid_data.sola_setpoint);
    println!(
        "    PI gains A kp={} ki={}, B kp={} ki={}",
        snapshot.pi_controller.sola_kp,
        snapshot.pi_controller.sola_ki,
        snapshot.pi_controller.solb_kp,
        snapshot.pi_controller.solb_ki
    );

    let stats = handle.shutdown().await?;
    control.abort();

    println!("\n  📊 Statistics:");
    println!(
        "    Frames: {}, Responses: {} ({} exceptions)",
        stats.frames_assembled, stats.responses_sent, stats.exceptions_sent
    );
    println!(
        "    Drops: {} foreign, {} CRC, {} short",
        stats.foreign_address_drops, stats.crc_drops, stats.short_frame_drops
    );

    Ok(())
}

/// Serve on the serial port named on the command line, if any.
#[cfg(feature = "rtu")]
async fn serial_line() -> ModbusResult<bool> {
    use voltage_rtu_slave::transport::open_serial;

    let Some(port) = std::env::args().nth(1) else {
        return Ok(false);
    };
    let slave_id = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(voltage_rtu_slave::DEFAULT_SLAVE_ADDRESS);

    let config = SlaveConfig::new()
        .with_slave_address(slave_id)
        .with_packet_logging(true);
    let (source, sink) = open_serial(&port, config.baud_rate)?;

    let app = SharedAppData::new(ModbusData::default());
    let control = spawn_control_loop(app.clone());
    let handle = RtuSlave::new(config, app, source, sink)?.spawn();

    println!("🔌 Serving slave {} on {} (Ctrl-C to stop)", slave_id, port);
    tokio::signal::ctrl_c().await.ok();

    let stats = handle.shutdown().await?;
    control.abort();
    println!("📊 {:?}", stats);
    Ok(true)
}

#[cfg(not(feature = "rtu"))]
async fn serial_line() -> ModbusResult<bool> {
    Ok(false)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("info")?;

    println!("🚀 Voltage RTU Slave v{} Demo", voltage_rtu_slave::VERSION);
    println!("==============================\n");

    println!("⏱️  Line timing (T3.5):");
    for baud in [9600, 19200, 115200] {
        let config = SlaveConfig::new().with_baud_rate(baud);
        println!("    {:>6} baud -> {:?}", baud, config.inter_char_timeout());
    }
    println!();

    if serial_line().await? {
        return Ok(());
    }

    simulated_line().await?;

    println!("\n🎉 Demo completed!");
    Ok(())
}
