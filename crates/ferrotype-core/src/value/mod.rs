//! # Values
//!
//! Interpretation of raw target bytes as primitive values.
//!
//! A base type record only carries a basic-type tag and a byte width. The
//! [`coerce`] table maps that pair onto a [`PrimitiveValue`]; bitfield
//! members are then narrowed with [`apply_bitfield`].

pub mod basic;
pub mod bitfield;

use std::fmt;

pub use basic::{coerce, is_coercible, BasicType};
pub use bitfield::{apply_bitfield, Bitfield};

use crate::types::Address;

/// Raw bytes of an x87 80-bit extended-precision float
///
/// Kept as bytes because Rust has no native 80-bit float. [`ExtendedFloat::to_f64`]
/// gives a (possibly lossy) conversion for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedFloat(pub [u8; 10]);

impl ExtendedFloat
{
    #[must_use]
    pub fn bytes(&self) -> &[u8; 10]
    {
        &self.0
    }

    /// Nearest `f64`, saturating to infinity or zero outside its range.
    #[must_use]
    pub fn to_f64(&self) -> f64
    {
        let mut mantissa_bytes = [0u8; 8];
        mantissa_bytes.copy_from_slice(&self.0[..8]);
        let mantissa = u64::from_le_bytes(mantissa_bytes);
        let sign_exponent = u16::from_le_bytes([self.0[8], self.0[9]]);
        let negative = sign_exponent & 0x8000 != 0;
        let exponent = i32::from(sign_exponent & 0x7fff);

        let magnitude = if exponent == 0 && mantissa == 0 {
            0.0
        } else if exponent == 0x7fff {
            if mantissa << 1 == 0 {
                f64::INFINITY
            } else {
                f64::NAN
            }
        } else {
            // Explicit integer bit: the mantissa is a fixed-point 1.63 value.
            let fraction = mantissa as f64 / 2f64.powi(63);
            let unbiased = if exponent == 0 { -16382 } else { exponent - 16383 };
            fraction * 2f64.powi(unbiased)
        };

        if negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for ExtendedFloat
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.to_f64())
    }
}

/// A primitive value read from the target or stored as a symbol constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue
{
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Extended(ExtendedFloat),
    Bool(bool),
    Hresult(u32),
}

impl PrimitiveValue
{
    /// Value as a signed integer, for integer-like variants.
    #[must_use]
    pub fn as_i64(self) -> Option<i64>
    {
        match self {
            PrimitiveValue::I8(v) => Some(i64::from(v)),
            PrimitiveValue::I16(v) => Some(i64::from(v)),
            PrimitiveValue::I32(v) => Some(i64::from(v)),
            PrimitiveValue::I64(v) => Some(v),
            PrimitiveValue::U8(v) => Some(i64::from(v)),
            PrimitiveValue::U16(v) => Some(i64::from(v)),
            PrimitiveValue::U32(v) | PrimitiveValue::Hresult(v) => Some(i64::from(v)),
            PrimitiveValue::U64(v) => i64::try_from(v).ok(),
            PrimitiveValue::Bool(v) => Some(i64::from(v)),
            PrimitiveValue::F32(_) | PrimitiveValue::F64(_) | PrimitiveValue::Extended(_) => None,
        }
    }

    /// Value as an unsigned integer, for non-negative integer-like variants.
    #[must_use]
    pub fn as_u64(self) -> Option<u64>
    {
        match self {
            PrimitiveValue::U64(v) => Some(v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }
}

impl fmt::Display for PrimitiveValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            PrimitiveValue::I8(v) => write!(f, "{v}"),
            PrimitiveValue::I16(v) => write!(f, "{v}"),
            PrimitiveValue::I32(v) => write!(f, "{v}"),
            PrimitiveValue::I64(v) => write!(f, "{v}"),
            PrimitiveValue::U8(v) => write!(f, "{v}"),
            PrimitiveValue::U16(v) => write!(f, "{v}"),
            PrimitiveValue::U32(v) => write!(f, "{v}"),
            PrimitiveValue::U64(v) => write!(f, "{v}"),
            PrimitiveValue::F32(v) => write!(f, "{v}"),
            PrimitiveValue::F64(v) => write!(f, "{v}"),
            PrimitiveValue::Extended(v) => write!(f, "{v}"),
            PrimitiveValue::Bool(v) => write!(f, "{v}"),
            PrimitiveValue::Hresult(v) => write!(f, "0x{v:08x}"),
        }
    }
}

/// Where the bytes of a value live on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueLocation
{
    /// Target memory at an absolute address
    Memory(Address),
    /// A register, identified by the session's register index
    Register(u32),
    /// Bytes the caller already holds
    Bytes(Vec<u8>),
}
