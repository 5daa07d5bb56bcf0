//! Register field descriptors.
//!
//! A [`RegisterField`] describes one register (or one high/low word pair)
//! and the semantic quantities it feeds. Decoding combines the words,
//! applies signedness, then scales once per target.

use super::image::RegisterImage;
use super::quantity::Quantity;
use super::scale;

/// Word interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Signed,
    /// Packed bitfield, decoded as unsigned and viewed through a bitflags type.
    Bits,
}

/// Access mode of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    #[inline]
    pub const fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[inline]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// One fan-out target of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub quantity: Quantity,
    /// `semantic = raw × 10^exponent`.
    pub exponent: i8,
}

/// Register field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterField {
    /// First register address. For word pairs this is the high word.
    pub address: u16,
    /// 1, or 2 for a `high << 16 | low` pair.
    pub words: u8,
    pub kind: FieldKind,
    pub access: Access,
    /// First target is the primary quantity used for encoding.
    pub targets: &'static [Target],
}

impl RegisterField {
    /// Primary quantity of this field.
    #[inline]
    pub fn primary(&self) -> Target {
        self.targets[0]
    }

    /// Combined, sign-extended raw value. `None` if any word is undetermined.
    pub fn raw_value(&self, image: &RegisterImage) -> Option<i64> {
        if self.words == 2 {
            let high = image.get(self.address)?;
            let low = image.get(self.address.checked_add(1)?)?;
            let combined = (u32::from(high) << 16) | u32::from(low);
            Some(match self.kind {
                FieldKind::Signed => i64::from(combined as i32),
                FieldKind::Unsigned | FieldKind::Bits => i64::from(combined),
            })
        } else {
            let word = image.get(self.address)?;
            Some(match self.kind {
                FieldKind::Signed => i64::from(word as i16),
                FieldKind::Unsigned | FieldKind::Bits => i64::from(word),
            })
        }
    }

    /// Decode every target of this field.
    pub fn decode<'a>(
        &'a self,
        image: &RegisterImage,
    ) -> impl Iterator<Item = (Quantity, Option<i64>)> + 'a {
        let raw = self.raw_value(image);
        self.targets
            .iter()
            .map(move |t| (t.quantity, raw.map(|r| scale::apply(r, t.exponent))))
    }

    /// Fit a raw value into one register word. `None` if out of range.
    pub fn to_word(&self, raw: i64) -> Option<u16> {
        match self.kind {
            FieldKind::Signed => i16::try_from(raw).ok().map(|v| v as u16),
            FieldKind::Unsigned | FieldKind::Bits => u16::try_from(raw).ok(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: RegisterField = RegisterField {
        address: 0x2181,
        words: 2,
        kind: FieldKind::Unsigned,
        access: Access::Read,
        targets: &[Target {
            quantity: Quantity::TotalCapacity,
            exponent: 1,
        }],
    };

    const CURRENT: RegisterField = RegisterField {
        address: 0x2101,
        words: 1,
        kind: FieldKind::Signed,
        access: Access::Read,
        targets: &[
            Target {
                quantity: Quantity::ClusterCurrent,
                exponent: 2,
            },
            Target {
                quantity: Quantity::Current,
                exponent: -1,
            },
        ],
    };

    #[test]
    fn word_pair_combines_before_scaling() {
        let mut image = RegisterImage::new();
        image.store_block(0x2181, &[0x0001, 0x0002]);
        let decoded: Vec<_> = PAIR.decode(&image).collect();
        assert_eq!(decoded, vec![(Quantity::TotalCapacity, Some(((1 << 16) | 2) * 10))]);
    }

    #[test]
    fn word_pair_needs_both_halves() {
        let mut image = RegisterImage::new();
        image.set(0x2181, 1);
        assert_eq!(PAIR.raw_value(&image), None);
    }

    #[test]
    fn signed_fan_out_scales_each_target() {
        let mut image = RegisterImage::new();
        image.set(0x2101, (-125i16) as u16);
        let decoded: Vec<_> = CURRENT.decode(&image).collect();
        assert_eq!(
            decoded,
            vec![
                (Quantity::ClusterCurrent, Some(-12_500)),
                (Quantity::Current, Some(-13)),
            ]
        );
    }

    #[test]
    fn to_word_respects_signedness() {
        assert_eq!(CURRENT.to_word(-1), Some(0xFFFF));
        assert_eq!(CURRENT.to_word(40_000), None);
        assert_eq!(PAIR.to_word(-1), None);
        assert_eq!(PAIR.to_word(65_535), Some(65_535));
    }

    #[test]
    fn access_modes() {
        assert!(Access::ReadWrite.readable() && Access::ReadWrite.writable());
        assert!(!Access::Write.readable());
        assert!(!Access::Read.writable());
    }
}
