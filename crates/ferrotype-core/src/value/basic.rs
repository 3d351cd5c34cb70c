//! Basic type tags and the table that maps `(tag, width)` to a primitive.

use std::fmt;

use super::{ExtendedFloat, PrimitiveValue};
use crate::error::{TypeError, TypeResult};

/// Basic type tag of a `BaseType` record
///
/// Values follow the DbgHelp `BasicType` numbering so that sessions backed by
/// a Windows symbol engine can pass raw tags straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType
{
    NoType,
    Void,
    Char,
    WChar,
    Int,
    UInt,
    Float,
    Bcd,
    Bool,
    Long,
    ULong,
    Currency,
    Date,
    Variant,
    Complex,
    Bit,
    Bstr,
    Hresult,
    Char16,
    Char32,
    Char8,
    /// A tag this crate does not know about
    Unknown(u32),
}

impl BasicType
{
    /// Decode a raw DbgHelp basic type value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self
    {
        match raw {
            0 => BasicType::NoType,
            1 => BasicType::Void,
            2 => BasicType::Char,
            3 => BasicType::WChar,
            6 => BasicType::Int,
            7 => BasicType::UInt,
            8 => BasicType::Float,
            9 => BasicType::Bcd,
            10 => BasicType::Bool,
            13 => BasicType::Long,
            14 => BasicType::ULong,
            25 => BasicType::Currency,
            26 => BasicType::Date,
            27 => BasicType::Variant,
            28 => BasicType::Complex,
            29 => BasicType::Bit,
            30 => BasicType::Bstr,
            31 => BasicType::Hresult,
            32 => BasicType::Char16,
            33 => BasicType::Char32,
            34 => BasicType::Char8,
            other => BasicType::Unknown(other),
        }
    }

    /// Conventional C/C++ spelling for a base type of the given width.
    #[must_use]
    pub fn type_name(self, width: u64) -> String
    {
        let name = match (self, width) {
            (BasicType::Void, _) => "void",
            (BasicType::Char, _) => "char",
            (BasicType::Char8, _) => "char8_t",
            (BasicType::WChar, _) => "wchar_t",
            (BasicType::Char16, _) => "char16_t",
            (BasicType::Char32, _) => "char32_t",
            (BasicType::Int, 1) => "__int8",
            (BasicType::Int, 2) => "short",
            (BasicType::Int, 4) => "int",
            (BasicType::Int, 8) => "__int64",
            (BasicType::Int, 16) => "__int128",
            (BasicType::UInt, 1) => "unsigned char",
            (BasicType::UInt, 2) => "unsigned short",
            (BasicType::UInt, 4) => "unsigned int",
            (BasicType::UInt, 8) => "unsigned __int64",
            (BasicType::UInt, 16) => "unsigned __int128",
            (BasicType::Long, 8) => "long long",
            (BasicType::Long, _) => "long",
            (BasicType::ULong, 8) => "unsigned long long",
            (BasicType::ULong, _) => "unsigned long",
            (BasicType::Float, 4) => "float",
            (BasicType::Float, 8) => "double",
            (BasicType::Float, 10) => "long double",
            (BasicType::Bool, _) => "bool",
            (BasicType::Hresult, _) => "HRESULT",
            (BasicType::Bstr, _) => "BSTR",
            (BasicType::Variant, _) => "VARIANT",
            (BasicType::Currency, _) => "CURRENCY",
            (BasicType::Date, _) => "DATE",
            _ => return format!("<{self} ({width} bytes)>"),
        };
        name.to_string()
    }
}

impl fmt::Display for BasicType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            BasicType::Unknown(raw) => write!(f, "bt{raw}"),
            other => write!(f, "bt{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion
{
    Signed,
    Unsigned,
    Float,
    Extended,
    Bool,
    Hresult,
}

const COERCIONS: &[(BasicType, u64, Coercion)] = &[
    (BasicType::Char, 1, Coercion::Signed),
    (BasicType::Char8, 1, Coercion::Unsigned),
    (BasicType::WChar, 2, Coercion::Unsigned),
    (BasicType::Char16, 2, Coercion::Unsigned),
    (BasicType::Char32, 4, Coercion::Unsigned),
    (BasicType::Int, 1, Coercion::Signed),
    (BasicType::Int, 2, Coercion::Signed),
    (BasicType::Int, 4, Coercion::Signed),
    (BasicType::Int, 8, Coercion::Signed),
    (BasicType::Long, 4, Coercion::Signed),
    (BasicType::Long, 8, Coercion::Signed),
    (BasicType::UInt, 1, Coercion::Unsigned),
    (BasicType::UInt, 2, Coercion::Unsigned),
    (BasicType::UInt, 4, Coercion::Unsigned),
    (BasicType::UInt, 8, Coercion::Unsigned),
    (BasicType::ULong, 4, Coercion::Unsigned),
    (BasicType::ULong, 8, Coercion::Unsigned),
    (BasicType::Float, 4, Coercion::Float),
    (BasicType::Float, 8, Coercion::Float),
    (BasicType::Float, 10, Coercion::Extended),
    (BasicType::Bool, 1, Coercion::Bool),
    (BasicType::Bool, 4, Coercion::Bool),
    (BasicType::Hresult, 4, Coercion::Hresult),
];

fn lookup(tag: BasicType, width: u64) -> Option<Coercion>
{
    COERCIONS
        .iter()
        .find(|(candidate, candidate_width, _)| *candidate == tag && *candidate_width == width)
        .map(|(_, _, coercion)| *coercion)
}

/// Whether `(tag, width)` has a primitive mapping.
#[must_use]
pub fn is_coercible(tag: BasicType, width: u64) -> bool
{
    lookup(tag, width).is_some()
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N]
{
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Convert raw little-endian bytes into a primitive value.
///
/// `bytes` must hold at least `width` bytes; extra bytes are ignored.
///
/// ## Errors
///
/// - `UnexpectedBasicType` when the pair has no mapping. This signals
///   inconsistent symbol data and is logged at `error` level.
/// - `InvalidArgument` when fewer than `width` bytes were supplied.
///
/// ## Example
///
/// ```rust
/// use ferrotype_core::value::{coerce, BasicType, PrimitiveValue};
///
/// let value = coerce(BasicType::UInt, 1, &[0xff]).unwrap();
/// assert_eq!(value, PrimitiveValue::U8(255));
/// ```
pub fn coerce(tag: BasicType, width: u64, bytes: &[u8]) -> TypeResult<PrimitiveValue>
{
    let Some(coercion) = lookup(tag, width) else {
        tracing::error!(%tag, width, "no primitive mapping for basic type");
        return Err(TypeError::UnexpectedBasicType {
            tag: tag.to_string(),
            width,
        });
    };

    let needed = usize::try_from(width).unwrap_or(usize::MAX);
    if bytes.len() < needed {
        return Err(TypeError::InvalidArgument(format!(
            "{tag} of width {width} needs {width} bytes, got {}",
            bytes.len()
        )));
    }

    let value = match (coercion, width) {
        (Coercion::Signed, 1) => PrimitiveValue::I8(i8::from_le_bytes(le_array(bytes))),
        (Coercion::Signed, 2) => PrimitiveValue::I16(i16::from_le_bytes(le_array(bytes))),
        (Coercion::Signed, 4) => PrimitiveValue::I32(i32::from_le_bytes(le_array(bytes))),
        (Coercion::Signed, _) => PrimitiveValue::I64(i64::from_le_bytes(le_array(bytes))),
        (Coercion::Unsigned, 1) => PrimitiveValue::U8(bytes[0]),
        (Coercion::Unsigned, 2) => PrimitiveValue::U16(u16::from_le_bytes(le_array(bytes))),
        (Coercion::Unsigned, 4) => PrimitiveValue::U32(u32::from_le_bytes(le_array(bytes))),
        (Coercion::Unsigned, _) => PrimitiveValue::U64(u64::from_le_bytes(le_array(bytes))),
        (Coercion::Float, 4) => PrimitiveValue::F32(f32::from_le_bytes(le_array(bytes))),
        (Coercion::Float, _) => PrimitiveValue::F64(f64::from_le_bytes(le_array(bytes))),
        (Coercion::Extended, _) => PrimitiveValue::Extended(ExtendedFloat(le_array(bytes))),
        (Coercion::Bool, 1) => PrimitiveValue::Bool(bytes[0] != 0),
        (Coercion::Bool, _) => PrimitiveValue::Bool(u32::from_le_bytes(le_array(bytes)) != 0),
        (Coercion::Hresult, _) => PrimitiveValue::Hresult(u32::from_le_bytes(le_array(bytes))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_uint_byte_is_unsigned()
    {
        assert_eq!(coerce(BasicType::UInt, 1, &[0xff]).unwrap(), PrimitiveValue::U8(255));
    }

    #[test]
    fn test_int_byte_is_signed()
    {
        assert_eq!(coerce(BasicType::Int, 1, &[0xff]).unwrap(), PrimitiveValue::I8(-1));
    }

    #[test]
    fn test_widths_are_little_endian()
    {
        assert_eq!(coerce(BasicType::UInt, 2, &[0x34, 0x12]).unwrap(), PrimitiveValue::U16(0x1234));
        assert_eq!(
            coerce(BasicType::Long, 4, &[0xfe, 0xff, 0xff, 0xff]).unwrap(),
            PrimitiveValue::I32(-2)
        );
        assert_eq!(
            coerce(BasicType::ULong, 8, &0xdead_beef_u64.to_le_bytes()).unwrap(),
            PrimitiveValue::U64(0xdead_beef)
        );
    }

    #[test]
    fn test_floats()
    {
        assert_eq!(coerce(BasicType::Float, 4, &1.5f32.to_le_bytes()).unwrap(), PrimitiveValue::F32(1.5));
        assert_eq!(coerce(BasicType::Float, 8, &(-2.25f64).to_le_bytes()).unwrap(), PrimitiveValue::F64(-2.25));
    }

    #[test]
    fn test_extended_float_keeps_raw_bytes()
    {
        let raw = [0, 0, 0, 0, 0, 0, 0, 0x80, 0xff, 0x3f];
        match coerce(BasicType::Float, 10, &raw).unwrap() {
            PrimitiveValue::Extended(ext) => {
                assert_eq!(ext.bytes(), &raw);
                assert_eq!(ext.to_f64(), 1.0);
            }
            other => panic!("expected extended float, got {other:?}"),
        }
    }

    #[test]
    fn test_bool_widths()
    {
        assert_eq!(coerce(BasicType::Bool, 1, &[2]).unwrap(), PrimitiveValue::Bool(true));
        assert_eq!(coerce(BasicType::Bool, 4, &[0, 0, 0, 0]).unwrap(), PrimitiveValue::Bool(false));
    }

    #[test]
    fn test_hresult_is_unsigned_32()
    {
        let value = coerce(BasicType::Hresult, 4, &0x8000_4005u32.to_le_bytes()).unwrap();
        assert_eq!(value, PrimitiveValue::Hresult(0x8000_4005));
    }

    #[test]
    fn test_unexpected_pair_is_an_error()
    {
        let err = coerce(BasicType::Int, 3, &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, TypeError::UnexpectedBasicType { width: 3, .. }));
        assert!(!is_coercible(BasicType::Void, 0));
    }

    #[test]
    fn test_short_buffer_is_rejected()
    {
        let err = coerce(BasicType::UInt, 4, &[0, 0]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidArgument(_)));
    }

    #[test]
    fn test_raw_tag_decoding()
    {
        assert_eq!(BasicType::from_raw(7), BasicType::UInt);
        assert_eq!(BasicType::from_raw(31), BasicType::Hresult);
        assert_eq!(BasicType::from_raw(99), BasicType::Unknown(99));
        assert_eq!(BasicType::UInt.type_name(4), "unsigned int");
    }
}
