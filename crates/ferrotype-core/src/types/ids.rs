//! Identity types for nodes in the type graph.

use std::fmt;

use super::address::Address;

/// Base address of the image (module) that owns a type record
///
/// Type ids are only unique within one module, so every lookup pairs an id
/// with the module base it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleBase(pub u64);

impl ModuleBase
{
    /// Load address of the module as an [`Address`].
    #[must_use]
    pub const fn address(self) -> Address
    {
        Address::new(self.0)
    }
}

impl From<u64> for ModuleBase
{
    fn from(value: u64) -> Self
    {
        ModuleBase(value)
    }
}

impl fmt::Display for ModuleBase
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:x}", self.0)
    }
}

/// Module-scoped handle identifying one type record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl From<u32> for TypeId
{
    fn from(value: u32) -> Self
    {
        TypeId(value)
    }
}

impl From<TypeId> for u32
{
    fn from(id: TypeId) -> Self
    {
        id.0
    }
}

impl fmt::Display for TypeId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Registry key: a type id qualified by its module
///
/// Two nodes with equal keys are the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey
{
    pub module: ModuleBase,
    pub type_id: TypeId,
}

impl TypeKey
{
    #[must_use]
    pub const fn new(module: ModuleBase, type_id: TypeId) -> Self
    {
        Self { module, type_id }
    }

    /// Key for another id in the same module.
    #[must_use]
    pub const fn sibling(self, type_id: TypeId) -> Self
    {
        Self {
            module: self.module,
            type_id,
        }
    }
}

impl fmt::Display for TypeKey
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}!{}", self.module, self.type_id)
    }
}
