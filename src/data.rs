//! Application data mirrored into the register table
//!
//! `ModbusData` is the state a supervisory master reads and writes: firmware
//! version, solenoid setpoints and measurements, PI controller gains and
//! state, and the gains persisted to EEPROM. Reserved words are carried
//! through unchanged.
//!
//! ## Register Map
//!
//! | Register | Field |
//! |----------|-------|
//! | 0 | `version` |
//! | 1-4 | `reserved` |
//! | 5-14 | [`SolenoidData`] |
//! | 15-16 | `reserved2` |
//! | 17-26 | [`PiController`] |
//! | 27-28 | `reserved3` |
//! | 29-36 | [`EepromData`] |
//!
//! Byte pairs sharing a word are packed little-endian: the first field is
//! the low byte.
//!
//! ## Firmware Compatibility
//!
//! The firmware's packed structure is 73 bytes. Here `error_code` is padded
//! with a reserved byte (register 14 high byte), so the map is 37 whole
//! registers. Registers 0-14 match the firmware byte for byte; from
//! register 15 on, a master built against the packed 73-byte map sees every
//! field shifted by one byte. This map is not wire-compatible with that
//! firmware.

use crate::sync::RegisterMapped;

/// Firmware version reported in register 0 (90 = v0.9)
pub const APP_VERSION: u16 = 90;

/// Number of words in [`ModbusData`]
pub const MODBUS_DATA_WORD_COUNT: usize = ModbusData::WORD_COUNT;

/// Register the mirror starts at
pub const MODBUS_DATA_BASE_ADDR: usize = 0;

#[inline]
fn pack_bytes(low: u8, high: u8) -> u16 {
    u16::from_le_bytes([low, high])
}

/// Solenoid setpoints, measurements and status (10 words)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolenoidData {
    pub sola_setpoint: u16,
    pub sola_measurement: u16,
    pub solb_setpoint: u16,
    pub solb_measurement: u16,
    /// PLC auxiliary input
    pub plc_aux: u16,
    /// External analog input
    pub ext_ain: u16,
    pub sola_current: u16,
    pub solb_current: u16,
    pub dip_switch: u8,
    pub status_sys: u8,
    pub error_code: u8,
    /// Pads `error_code` to a full word
    pub reserved: u8,
}

impl RegisterMapped for SolenoidData {
    const WORD_COUNT: usize = 10;

    fn word(&self, index: usize) -> u16 {
        match index {
            0 => self.sola_setpoint,
            1 => self.sola_measurement,
            2 => self.solb_setpoint,
            3 => self.solb_measurement,
            4 => self.plc_aux,
            5 => self.ext_ain,
            6 => self.sola_current,
            7 => self.solb_current,
            8 => pack_bytes(self.dip_switch, self.status_sys),
            9 => pack_bytes(self.error_code, self.reserved),
            _ => 0,
        }
    }

    fn set_word(&mut self, index: usize, value: u16) {
        let [low, high] = value.to_le_bytes();
        match index {
            0 => self.sola_setpoint = value,
            1 => self.sola_measurement = value,
            2 => self.solb_setpoint = value,
            3 => self.solb_measurement = value,
            4 => self.plc_aux = value,
            5 => self.ext_ain = value,
            6 => self.sola_current = value,
            7 => self.solb_current = value,
            8 => {
                self.dip_switch = low;
                self.status_sys = high;
            }
            9 => {
                self.error_code = low;
                self.reserved = high;
            }
            _ => {}
        }
    }
}

/// PI controller gains and running state (10 signed words)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PiController {
    pub sola_kp: i16,
    pub sola_ki: i16,
    pub solb_kp: i16,
    pub solb_ki: i16,
    pub integral: i16,
    pub prev_error: i16,
    pub out_min: i16,
    pub out_max: i16,
    pub integral_min: i16,
    pub integral_max: i16,
}

impl PiController {
    fn field(&self, index: usize) -> Option<i16> {
        Some(match index {
            0 => self.sola_kp,
            1 => self.sola_ki,
            2 => self.solb_kp,
            3 => self.solb_ki,
            4 => self.integral,
            5 => self.prev_error,
            6 => self.out_min,
            7 => self.out_max,
            8 => self.integral_min,
            9 => self.integral_max,
            _ => return None,
        })
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut i16> {
        Some(match index {
            0 => &mut self.sola_kp,
            1 => &mut self.sola_ki,
            2 => &mut self.solb_kp,
            3 => &mut self.solb_ki,
            4 => &mut self.integral,
            5 => &mut self.prev_error,
            6 => &mut self.out_min,
            7 => &mut self.out_max,
            8 => &mut self.integral_min,
            9 => &mut self.integral_max,
            _ => return None,
        })
    }
}

impl RegisterMapped for PiController {
    const WORD_COUNT: usize = 10;

    fn word(&self, index: usize) -> u16 {
        self.field(index).map(|v| v as u16).unwrap_or(0)
    }

    fn set_word(&mut self, index: usize, value: u16) {
        if let Some(field) = self.field_mut(index) {
            *field = value as i16;
        }
    }
}

/// Gains persisted to EEPROM (8 words)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EepromData {
    pub sola_kp: u16,
    pub sola_ki: u16,
    pub solb_kp: u16,
    pub solb_ki: u16,
    pub reserved: [u16; 4],
}

impl RegisterMapped for EepromData {
    const WORD_COUNT: usize = 8;

    fn word(&self, index: usize) -> u16 {
        match index {
            0 => self.sola_kp,
            1 => self.sola_ki,
            2 => self.solb_kp,
            3 => self.solb_ki,
            4..=7 => self.reserved[index - 4],
            _ => 0,
        }
    }

    fn set_word(&mut self, index: usize, value: u16) {
        match index {
            0 => self.sola_kp = value,
            1 => self.sola_ki = value,
            2 => self.solb_kp = value,
            3 => self.solb_ki = value,
            4..=7 => self.reserved[index - 4] = value,
            _ => {}
        }
    }
}

/// Everything the master can see, in register order (37 words)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusData {
    pub version: u16,
    pub reserved: [u16; 4],
    pub solenoid_data: SolenoidData,
    pub reserved2: [u16; 2],
    pub pi_controller: PiController,
    pub reserved3: [u16; 2],
    pub eeprom_data: EepromData,
}

const SOLENOID_OFFSET: usize = 5;
const RESERVED2_OFFSET: usize = SOLENOID_OFFSET + SolenoidData::WORD_COUNT;
const PI_OFFSET: usize = RESERVED2_OFFSET + 2;
const RESERVED3_OFFSET: usize = PI_OFFSET + PiController::WORD_COUNT;
const EEPROM_OFFSET: usize = RESERVED3_OFFSET + 2;

impl Default for ModbusData {
    fn default() -> Self {
        Self {
            version: APP_VERSION,
            reserved: [0; 4],
            solenoid_data: SolenoidData::default(),
            reserved2: [0; 2],
            pi_controller: PiController::default(),
            reserved3: [0; 2],
            eeprom_data: EepromData::default(),
        }
    }
}

impl RegisterMapped for ModbusData {
    const WORD_COUNT: usize = EEPROM_OFFSET + EepromData::WORD_COUNT;

    fn word(&self, index: usize) -> u16 {
        match index {
            0 => self.version,
            1..SOLENOID_OFFSET => self.reserved[index - 1],
            SOLENOID_OFFSET..RESERVED2_OFFSET => self.solenoid_data.word(index - SOLENOID_OFFSET),
            RESERVED2_OFFSET..PI_OFFSET => self.reserved2[index - RESERVED2_OFFSET],
            PI_OFFSET..RESERVED3_OFFSET => self.pi_controller.word(index - PI_OFFSET),
            RESERVED3_OFFSET..EEPROM_OFFSET => self.reserved3[index - RESERVED3_OFFSET],
            _ => self.eeprom_data.word(index - EEPROM_OFFSET),
        }
    }

    fn set_word(&mut self, index: usize, value: u16) {
        match index {
            0 => self.version = value,
            1..SOLENOID_OFFSET => self.reserved[index - 1] = value,
            SOLENOID_OFFSET..RESERVED2_OFFSET => {
                self.solenoid_data.set_word(index - SOLENOID_OFFSET, value)
            }
            RESERVED2_OFFSET..PI_OFFSET => self.reserved2[index - RESERVED2_OFFSET] = value,
            PI_OFFSET..RESERVED3_OFFSET => self.pi_controller.set_word(index - PI_OFFSET, value),
            RESERVED3_OFFSET..EEPROM_OFFSET => self.reserved3[index - RESERVED3_OFFSET] = value,
            _ => self.eeprom_data.set_word(index - EEPROM_OFFSET, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegisterTable;
    use crate::sync::{registers_to_struct, struct_to_registers};
    use proptest::prelude::*;

    #[test]
    fn test_word_count() {
        assert_eq!(SolenoidData::WORD_COUNT, 10);
        assert_eq!(MODBUS_DATA_WORD_COUNT, 37);
    }

    #[test]
    fn test_register_map_positions() {
        let mut data = ModbusData::default();
        data.solenoid_data.sola_setpoint = 1000;
        data.solenoid_data.dip_switch = 0x05;
        data.solenoid_data.status_sys = 0x80;
        data.solenoid_data.error_code = 0x02;
        data.pi_controller.sola_kp = -2;
        data.pi_controller.integral_max = 500;
        data.eeprom_data.sola_kp = 0x0102;
        data.eeprom_data.reserved[3] = 0xFFFF;

        let words = data.to_words();
        assert_eq!(words[0], APP_VERSION);
        assert_eq!(words[5], 1000);
        assert_eq!(words[13], 0x8005);
        assert_eq!(words[14], 0x0002);
        assert_eq!(words[17], 0xFFFE);
        assert_eq!(words[26], 500);
        assert_eq!(words[29], 0x0102);
        assert_eq!(words[36], 0xFFFF);
    }

    #[test]
    fn test_signed_fields_round_trip_through_words() {
        let mut data = ModbusData::default();
        data.set_word(22, 0x8000);
        assert_eq!(data.pi_controller.prev_error, i16::MIN);
        assert_eq!(data.word(22), 0x8000);
    }

    #[test]
    fn test_out_of_range_words() {
        let mut data = ModbusData::default();
        data.set_word(37, 0x1234);
        assert_eq!(data, ModbusData::default());
        assert_eq!(data.word(100), 0);
    }

    fn arb_modbus_data() -> impl Strategy<Value = ModbusData> {
        prop::collection::vec(any::<u16>(), ModbusData::WORD_COUNT).prop_map(|words| {
            let mut data = ModbusData::default();
            data.load_words(&words);
            data
        })
    }

    proptest! {
        #[test]
        fn prop_sync_round_trip_is_identity(data in arb_modbus_data()) {
            let mut table = RegisterTable::new(MODBUS_DATA_WORD_COUNT);
            struct_to_registers(&data, &mut table, MODBUS_DATA_BASE_ADDR);

            let mut restored = ModbusData::default();
            registers_to_struct(&table, &mut restored, MODBUS_DATA_BASE_ADDR);
            prop_assert_eq!(restored, data);
        }

        #[test]
        fn prop_words_cover_every_register(words in prop::collection::vec(any::<u16>(), 37)) {
            let mut data = ModbusData::default();
            data.load_words(&words);
            prop_assert_eq!(data.to_words(), words);
        }
    }
}
