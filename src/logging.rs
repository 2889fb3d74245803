//! Logging setup and packet dumps

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a subscriber is
/// already installed.
pub fn init(level: &str) -> ModbusResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| ModbusError::configuration(format!("Failed to initialize logging: {}", e)))
}

/// Format raw bytes as space-separated uppercase hex
pub fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Frame hex dumps, enabled per slave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketLogger {
    enabled: bool,
}

impl PacketLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Log an inbound frame
    pub fn log_rx(&self, slave: SlaveId, data: &[u8]) {
        self.log("recv", slave, data);
    }

    /// Log an outbound frame
    pub fn log_tx(&self, slave: SlaveId, data: &[u8]) {
        self.log("send", slave, data);
    }

    fn log(&self, direction: &str, slave: SlaveId, data: &[u8]) {
        if self.enabled {
            info!(
                "[MODBUS-RTU] {} slave:{} {}",
                direction,
                slave,
                format_hex_packet(data)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_packet() {
        assert_eq!(
            format_hex_packet(&[0x01, 0x03, 0x00, 0x0A, 0xC4, 0x0B]),
            "01 03 00 0A C4 0B"
        );
        assert_eq!(format_hex_packet(&[]), "");
    }

    #[test]
    fn test_packet_logger_toggle() {
        let mut logger = PacketLogger::default();
        assert!(!logger.is_enabled());
        logger.set_enabled(true);
        assert!(logger.is_enabled());
        logger.log_rx(1, &[0x01, 0x03]);
        logger.log_tx(1, &[0x01, 0x83, 0x02]);
    }

    #[test]
    fn test_init_twice_fails() {
        let _ = init("debug");
        let err = init("debug").unwrap_err();
        assert!(matches!(err, ModbusError::Configuration { .. }));
    }
}
