//! # Struct/Register Synchronizer
//!
//! Keeps the protocol-visible register table consistent with the live
//! application structure. Each frame cycle runs:
//!
//! 1. [`Synchronizer::snapshot`]: application structure → registers, so a
//!    read request observes the latest application state.
//! 2. The dispatcher, under the register lock only.
//! 3. [`Synchronizer::commit`]: registers → application structure, so a
//!    write request reaches the application before its next tick.
//!
//! The two phases take their locks independently. Application writes that
//! land between them are not visible to that request and are overwritten by
//! the commit.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{ModbusError, ModbusResult};
use crate::register::{RegisterStore, RegisterTable};

/// A fixed-layout structure viewed as an ordered sequence of 16-bit words.
///
/// Implementations list their fields explicitly, so the word order and the
/// byte packing inside each word are part of the type rather than of its
/// memory layout.
pub trait RegisterMapped {
    /// Number of words in the structure; fixed at build time
    const WORD_COUNT: usize;

    /// Word at `index`; 0 for indices past `WORD_COUNT`
    fn word(&self, index: usize) -> u16;

    /// Overwrite the word at `index`; ignored past `WORD_COUNT`
    fn set_word(&mut self, index: usize, value: u16);

    /// All words in order
    fn to_words(&self) -> Vec<u16> {
        (0..Self::WORD_COUNT).map(|i| self.word(i)).collect()
    }

    /// Overwrite all words from `words`; missing trailing words are left alone
    fn load_words(&mut self, words: &[u16]) {
        for (i, &value) in words.iter().take(Self::WORD_COUNT).enumerate() {
            self.set_word(i, value);
        }
    }
}

/// Copy every word of `data` into `table[base + i]`, skipping indices past
/// the end of the table.
pub fn struct_to_registers<T: RegisterMapped>(data: &T, table: &mut RegisterTable, base: usize) {
    for i in 0..T::WORD_COUNT {
        let index = base + i;
        if index < table.len() {
            table.set(index, data.word(i));
        }
    }
}

/// Overwrite every word of `data` from `table[base + i]`.
///
/// No bounds skip: registers past the end of the table read as 0.
pub fn registers_to_struct<T: RegisterMapped>(table: &RegisterTable, data: &mut T, base: usize) {
    for i in 0..T::WORD_COUNT {
        data.set_word(i, table.get(base + i));
    }
}

/// Application data shared between the control task(s) and the protocol task.
///
/// The lock belongs to the application; the protocol task only takes it
/// inside the two synchronization phases.
#[derive(Debug, Default)]
pub struct SharedAppData<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedAppData<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedAppData<T> {
    /// Wrap application data for sharing
    pub fn new(data: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(data)),
        }
    }

    /// Acquire the application lock
    pub fn lock(&self) -> ModbusResult<MutexGuard<'_, T>> {
        self.inner
            .lock()
            .map_err(|_| ModbusError::internal("Failed to lock application data"))
    }

    /// Mutate the data under the lock
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> ModbusResult<R> {
        let mut data = self.lock()?;
        Ok(f(&mut data))
    }
}

impl<T: Clone> SharedAppData<T> {
    /// Copy of the current data
    pub fn get(&self) -> ModbusResult<T> {
        Ok(self.lock()?.clone())
    }
}

/// Runs the two synchronization phases around each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Synchronizer {
    base: usize,
}

impl Synchronizer {
    /// Mirror the structure at register `base`
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    /// First register of the mirror
    pub fn base(&self) -> usize {
        self.base
    }

    /// Phase 1: application structure → registers.
    ///
    /// Lock order: application, then registers.
    pub fn snapshot<T: RegisterMapped>(
        &self,
        app: &SharedAppData<T>,
        registers: &RegisterStore,
    ) -> ModbusResult<()> {
        let data = app.lock()?;
        let mut table = registers.lock()?;
        struct_to_registers(&*data, &mut table, self.base);
        debug!(
            "Synced {} words to registers at base {}",
            T::WORD_COUNT,
            self.base
        );
        Ok(())
    }

    /// Phase 2: registers → application structure.
    ///
    /// Lock order: application, then registers.
    pub fn commit<T: RegisterMapped>(
        &self,
        app: &SharedAppData<T>,
        registers: &RegisterStore,
    ) -> ModbusResult<()> {
        let mut data = app.lock()?;
        let table = registers.lock()?;
        registers_to_struct(&table, &mut *data, self.base);
        debug!(
            "Synced {} words from registers at base {}",
            T::WORD_COUNT,
            self.base
        );
        Ok(())
    }
}
