//! Target machine properties that affect type layout.

use std::fmt;

/// Pointer width of the debug target
///
/// VTable pointers in instance layouts and pointer types without an explicit
/// size take their width from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetWidth
{
    /// 32-bit target (4-byte pointers)
    Bits32,
    /// 64-bit target (8-byte pointers)
    Bits64,
}

impl TargetWidth
{
    /// Map a pointer size in bytes to a target width.
    ///
    /// Returns `None` for anything other than 4 or 8.
    #[must_use]
    pub const fn from_pointer_size(bytes: u64) -> Option<Self>
    {
        match bytes {
            4 => Some(TargetWidth::Bits32),
            8 => Some(TargetWidth::Bits64),
            _ => None,
        }
    }

    /// Get the pointer size in bytes for this target
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u64
    {
        match self {
            TargetWidth::Bits32 => 4,
            TargetWidth::Bits64 => 8,
        }
    }

    #[must_use]
    pub const fn is_64bit(self) -> bool
    {
        matches!(self, TargetWidth::Bits64)
    }
}

impl fmt::Display for TargetWidth
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            TargetWidth::Bits32 => write!(f, "32-bit"),
            TargetWidth::Bits64 => write!(f, "64-bit"),
        }
    }
}
