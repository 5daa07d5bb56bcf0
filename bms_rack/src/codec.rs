//! Register codec: raw protocol words ↔ semantic values.
//!
//! Stateless. Decoding walks [`table::REGISTER_TABLE`] over a
//! [`RegisterImage`]; encoding looks up the field whose primary target is
//! the requested quantity and produces a [`RegisterWrite`].
//!
//! # Conversions
//!
//! - Direct: signed or unsigned word, no transform.
//! - Scaled: `semantic = raw × 10^exponent` (see [`scale`]).
//! - Fan-out: one field feeds several independently scaled quantities.
//! - Bitfield: unsigned word viewed through a bitflags type.
//! - Word pair: `high << 16 | low`, combined before scaling.
//! - Indexed blocks: 12 cell voltages and 12 cell temperatures per module.

pub mod field;
pub mod image;
pub mod quantity;
pub mod scale;
pub mod table;

use bms_common::consts::{MAX_WRITES_PER_CYCLE, SENSORS_PER_MODULE};
use serde::Serialize;
use thiserror::Error;

pub use field::{Access, FieldKind, RegisterField, Target};
pub use image::RegisterImage;
pub use quantity::Quantity;

// ─── Error Type ─────────────────────────────────────────────────────

/// Encoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Value does not fit the register after scaling.
    #[error("value {value} out of range for {quantity}")]
    OutOfRange { quantity: Quantity, value: i64 },

    /// Register is read-only or a word pair.
    #[error("{0} is not writable")]
    NotWritable(Quantity),

    /// No register encodes this quantity.
    #[error("no register encodes {0}")]
    UnknownQuantity(Quantity),
}

// ─── Register Write ─────────────────────────────────────────────────

/// One encoded single-register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterWrite {
    pub address: u16,
    /// Word transmitted on the wire.
    pub raw: u16,
    pub quantity: Quantity,
    /// Semantic value before scaling.
    pub value: i64,
}

/// Writes queued in one cycle, in transmission order.
pub type Writes = heapless::Vec<RegisterWrite, MAX_WRITES_PER_CYCLE>;

// ─── Encode / Decode ────────────────────────────────────────────────

/// Encode `value` for `quantity`.
pub fn encode(quantity: Quantity, value: i64) -> Result<RegisterWrite, CodecError> {
    let field = table::field_for(quantity).ok_or(CodecError::UnknownQuantity(quantity))?;
    if !field.access.writable() || field.words != 1 {
        return Err(CodecError::NotWritable(quantity));
    }
    let raw = scale::invert(value, field.primary().exponent)
        .and_then(|raw| field.to_word(raw))
        .ok_or(CodecError::OutOfRange { quantity, value })?;
    Ok(RegisterWrite {
        address: field.address,
        raw,
        quantity,
        value,
    })
}

/// Decode every readable field of the table. Indexed by [`Quantity::index`].
pub fn decode_all(image: &RegisterImage) -> Vec<Option<i64>> {
    let mut values = vec![None; Quantity::COUNT];
    for field in table::REGISTER_TABLE.iter().filter(|f| f.access.readable()) {
        for (quantity, value) in field.decode(image) {
            values[quantity.index()] = value;
        }
    }
    values
}

/// Decode the cell-voltage [mV] array for `module_count` modules.
pub fn decode_cell_voltages(image: &RegisterImage, module_count: u8) -> Vec<Option<i64>> {
    decode_cells(image, module_count, table::voltage_block_start, |w| i64::from(w))
}

/// Decode the cell-temperature [deci-°C] array for `module_count` modules.
pub fn decode_cell_temperatures(image: &RegisterImage, module_count: u8) -> Vec<Option<i64>> {
    decode_cells(image, module_count, table::temperature_block_start, |w| {
        i64::from(w as i16)
    })
}

fn decode_cells(
    image: &RegisterImage,
    module_count: u8,
    block_start: fn(u8) -> u16,
    convert: fn(u16) -> i64,
) -> Vec<Option<i64>> {
    let mut cells = Vec::with_capacity(usize::from(module_count) * SENSORS_PER_MODULE);
    for module in 0..module_count {
        let start = block_start(module);
        for sensor in 0..SENSORS_PER_MODULE as u16 {
            cells.push(image.get(start + sensor).map(convert));
        }
    }
    cells
}

// ─── Tests ──────────────────────────────────────────────────────────
