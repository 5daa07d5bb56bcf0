//! Last-read register image.
//!
//! Holds the most recent successfully read value of every register the
//! supervisor polls. Registers that were never read, or whose block went
//! stale, are `None` and decode as undetermined.

use bms_common::consts::{ADDRESS_OFFSET, MAX_MODULES, SENSORS_PER_MODULE, TEMPERATURE_ADDRESS_OFFSET};

/// One past the highest polled address.
pub const IMAGE_END: u16 =
    TEMPERATURE_ADDRESS_OFFSET + (MAX_MODULES as usize * SENSORS_PER_MODULE) as u16;

const IMAGE_LEN: usize = (IMAGE_END - ADDRESS_OFFSET) as usize;

/// Dense register image covering `ADDRESS_OFFSET..IMAGE_END`.
#[derive(Debug, Clone)]
pub struct RegisterImage {
    words: Vec<Option<u16>>,
}

impl RegisterImage {
    /// Empty image: every register undetermined.
    pub fn new() -> Self {
        Self {
            words: vec![None; IMAGE_LEN],
        }
    }

    #[inline]
    fn slot(address: u16) -> Option<usize> {
        if (ADDRESS_OFFSET..IMAGE_END).contains(&address) {
            Some((address - ADDRESS_OFFSET) as usize)
        } else {
            None
        }
    }

    /// Value of one register, if known.
    #[inline]
    pub fn get(&self, address: u16) -> Option<u16> {
        Self::slot(address).and_then(|i| self.words[i])
    }

    /// Set one register. Addresses outside the image are ignored.
    pub fn set(&mut self, address: u16, value: u16) {
        if let Some(i) = Self::slot(address) {
            self.words[i] = Some(value);
        }
    }

    /// Store a block read starting at `start`.
    pub fn store_block(&mut self, start: u16, words: &[u16]) {
        for (offset, &word) in words.iter().enumerate() {
            if let Some(address) = start.checked_add(offset as u16) {
                self.set(address, word);
            }
        }
    }

    /// Mark `count` registers from `start` as undetermined.
    pub fn invalidate_block(&mut self, start: u16, count: u16) {
        for offset in 0..count {
            if let Some(i) = start.checked_add(offset).and_then(Self::slot) {
                self.words[i] = None;
            }
        }
    }

    /// Number of registers with a known value.
    pub fn known_count(&self) -> usize {
        self.words.iter().filter(|w| w.is_some()).count()
    }
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
