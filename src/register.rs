//! Register store for the slave
//!
//! A fixed-size table of holding registers behind a single exclusive lock.
//! [`RegisterTable::get`] and [`RegisterTable::set`] are only reachable
//! through the guard returned by [`RegisterStore::lock`], so every access
//! happens with the lock held.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ModbusError, ModbusResult};

/// Fixed-size table of 16-bit holding registers, zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTable {
    registers: Box<[u16]>,
}

impl RegisterTable {
    /// Create a zero-filled table of `size` registers
    pub fn new(size: usize) -> Self {
        Self {
            registers: vec![0u16; size].into_boxed_slice(),
        }
    }

    /// Number of registers
    #[inline]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Check if the table has no registers
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Register value, or 0 when `index` is out of range.
    #[inline]
    pub fn get(&self, index: usize) -> u16 {
        self.registers.get(index).copied().unwrap_or(0)
    }

    /// Store a register value; out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, value: u16) {
        if let Some(slot) = self.registers.get_mut(index) {
            *slot = value;
        }
    }

    /// Fail with `InvalidAddress` unless `start..start + count` lies in the table.
    pub fn check_range(&self, start: u16, count: u16) -> ModbusResult<()> {
        if u32::from(start) + u32::from(count) > self.len() as u32 {
            return Err(ModbusError::invalid_address(start, count));
        }
        Ok(())
    }

    /// Borrow `count` registers starting at `start`
    pub fn read_range(&self, start: u16, count: u16) -> ModbusResult<&[u16]> {
        self.check_range(start, count)?;
        let start = usize::from(start);
        Ok(&self.registers[start..start + usize::from(count)])
    }

    /// Overwrite consecutive registers starting at `start`
    pub fn write_range(&mut self, start: u16, values: &[u16]) -> ModbusResult<()> {
        let count = u16::try_from(values.len())
            .map_err(|_| ModbusError::invalid_address(start, u16::MAX))?;
        self.check_range(start, count)?;
        let start = usize::from(start);
        self.registers[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// All registers
    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.registers
    }
}

/// Shared handle to the register table.
///
/// Cloning is cheap; all clones see the same table. The protocol task and
/// application tasks each hold one.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    table: Arc<Mutex<RegisterTable>>,
    size: usize,
}

impl RegisterStore {
    /// Create a zero-filled store of `size` registers
    pub fn new(size: usize) -> Self {
        Self {
            table: Arc::new(Mutex::new(RegisterTable::new(size))),
            size,
        }
    }

    /// Number of registers; fixed for the lifetime of the store
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Acquire the exclusive lock.
    ///
    /// Never hold the guard across an `.await`.
    pub fn lock(&self) -> ModbusResult<MutexGuard<'_, RegisterTable>> {
        self.table
            .lock()
            .map_err(|_| ModbusError::internal("Failed to lock register table"))
    }

    /// Copy of every register value
    pub fn snapshot(&self) -> ModbusResult<Vec<u16>> {
        Ok(self.lock()?.as_slice().to_vec())
    }
}
