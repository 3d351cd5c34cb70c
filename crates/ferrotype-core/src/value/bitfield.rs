//! Bitfield extraction over already-coerced primitive values.

use super::PrimitiveValue;
use crate::error::{TypeError, TypeResult};

const MAX_BITFIELD_BITS: u32 = 64;

fn mask_for_width(width: u32) -> u64
{
    if width == 0 {
        0
    } else if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Bit placement of a data member inside its storage unit
///
/// `position` counts from the least significant bit of the storage unit,
/// which is read little-endian from the member's byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitfield
{
    pub length: u32,
    pub position: u32,
}

impl Bitfield
{
    #[must_use]
    pub const fn new(length: u32, position: u32) -> Self
    {
        Self { length, position }
    }

    /// Mask of `length` low bits.
    #[must_use]
    pub fn mask(self) -> u64
    {
        mask_for_width(self.length)
    }

    /// Shift and mask `raw` down to the field's bits (zero-extended).
    #[must_use]
    pub fn extract(self, raw: u64) -> u64
    {
        if self.position >= 64 {
            return 0;
        }
        (raw >> self.position) & self.mask()
    }

    /// Sign-extend an extracted value from `length` bits.
    #[must_use]
    pub fn sign_extend(self, bits: u64) -> i64
    {
        if self.length == 0 || self.length >= 64 {
            return bits as i64;
        }
        let shift = 64 - self.length;
        ((bits << shift) as i64) >> shift
    }

    fn validate(self, storage_bits: u32) -> TypeResult<()>
    {
        if self.length == 0 || self.length > MAX_BITFIELD_BITS {
            return Err(TypeError::InvalidArgument(format!("bitfield length {} is out of range", self.length)));
        }
        if self.position.checked_add(self.length).map_or(true, |end| end > storage_bits) {
            return Err(TypeError::InvalidArgument(format!(
                "bitfield at bit {} with length {} exceeds {storage_bits}-bit storage",
                self.position, self.length
            )));
        }
        Ok(())
    }
}

fn read_le(raw: &[u8]) -> u64
{
    raw.iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (index, byte)| acc | (u64::from(*byte) << (index * 8)))
}

/// Re-mask a coerced value by the member's bitfield placement.
///
/// `raw` holds the storage unit's bytes as read from the target. Boolean
/// bitfields are re-derived from `raw` because the coerced `bool` has already
/// lost the neighbouring bits. Signed integers are sign-extended from the
/// field width.
///
/// ## Errors
///
/// `InvalidArgument` when the placement does not fit the storage unit or the
/// value is floating point.
pub fn apply_bitfield(value: PrimitiveValue, raw: &[u8], bitfield: Bitfield) -> TypeResult<PrimitiveValue>
{
    let storage_bits = u32::try_from(raw.len().min(8) * 8).unwrap_or(MAX_BITFIELD_BITS);
    bitfield.validate(storage_bits)?;

    let unsigned = |bits: u64| bitfield.extract(bits);
    let signed = |bits: u64| bitfield.sign_extend(bitfield.extract(bits));

    // The `as` casts truncate values that already fit the field width.
    Ok(match value {
        PrimitiveValue::Bool(_) => PrimitiveValue::Bool(unsigned(read_le(raw)) != 0),
        PrimitiveValue::F32(_) | PrimitiveValue::F64(_) | PrimitiveValue::Extended(_) => {
            return Err(TypeError::InvalidArgument("bitfields over floating-point values are not meaningful".into()));
        }
        PrimitiveValue::I8(v) => PrimitiveValue::I8(signed(u64::from(v as u8)) as i8),
        PrimitiveValue::I16(v) => PrimitiveValue::I16(signed(u64::from(v as u16)) as i16),
        PrimitiveValue::I32(v) => PrimitiveValue::I32(signed(u64::from(v as u32)) as i32),
        PrimitiveValue::I64(v) => PrimitiveValue::I64(signed(v as u64)),
        PrimitiveValue::U8(v) => PrimitiveValue::U8(unsigned(u64::from(v)) as u8),
        PrimitiveValue::U16(v) => PrimitiveValue::U16(unsigned(u64::from(v)) as u16),
        PrimitiveValue::U32(v) => PrimitiveValue::U32(unsigned(u64::from(v)) as u32),
        PrimitiveValue::U64(v) => PrimitiveValue::U64(unsigned(v)),
        PrimitiveValue::Hresult(v) => PrimitiveValue::Hresult(unsigned(u64::from(v)) as u32),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_extract_length_three_position_two()
    {
        let field = Bitfield::new(3, 2);
        assert_eq!(field.extract(0b0001_1100), 7);
    }

    #[test]
    fn test_unsigned_bitfield_over_byte()
    {
        let raw = [0b0001_1100u8];
        let value = apply_bitfield(PrimitiveValue::U8(raw[0]), &raw, Bitfield::new(3, 2)).unwrap();
        assert_eq!(value, PrimitiveValue::U8(7));
    }

    #[test]
    fn test_signed_bitfield_sign_extends()
    {
        let raw = [0b0001_1100u8, 0, 0, 0];
        let value = apply_bitfield(PrimitiveValue::I32(0b0001_1100), &raw, Bitfield::new(3, 2)).unwrap();
        assert_eq!(value, PrimitiveValue::I32(-1));
    }

    #[test]
    fn test_bool_bitfield_rereads_raw_byte()
    {
        // The coerced bool is `true` for the whole byte; bit 0 alone is clear.
        let raw = [0b0000_0010u8];
        let value = apply_bitfield(PrimitiveValue::Bool(true), &raw, Bitfield::new(1, 0)).unwrap();
        assert_eq!(value, PrimitiveValue::Bool(false));

        let value = apply_bitfield(PrimitiveValue::Bool(true), &raw, Bitfield::new(1, 1)).unwrap();
        assert_eq!(value, PrimitiveValue::Bool(true));
    }

    #[test]
    fn test_bitfield_past_storage_is_rejected()
    {
        let raw = [0xffu8];
        let err = apply_bitfield(PrimitiveValue::U8(0xff), &raw, Bitfield::new(4, 6)).unwrap_err();
        assert!(matches!(err, TypeError::InvalidArgument(_)));
    }

    #[test]
    fn test_bitfield_position_near_u32_max_is_rejected()
    {
        let raw = [0xffu8; 4];
        let err = apply_bitfield(PrimitiveValue::U32(u32::MAX), &raw, Bitfield::new(4, u32::MAX)).unwrap_err();
        assert!(matches!(err, TypeError::InvalidArgument(_)));
    }

    #[test]
    fn test_float_bitfield_is_rejected()
    {
        let raw = [0u8; 4];
        assert!(apply_bitfield(PrimitiveValue::F32(1.0), &raw, Bitfield::new(1, 0)).is_err());
    }
}
