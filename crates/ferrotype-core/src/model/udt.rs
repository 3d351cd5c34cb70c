//! Populated contents of a UDT.

use crate::types::{Address, TypeKey};
use crate::value::{Bitfield, PrimitiveValue};

/// One entry in a UDT's member lists
///
/// Members projected from a non-virtual base carry the base's type in
/// `inherited_from`, and their `offset` is relative to the derived class.
#[derive(Debug, Clone, PartialEq)]
pub struct UdtMember
{
    pub name: String,
    /// The `DataMember` or `StaticDataMember` node
    pub member: TypeKey,
    pub member_type: TypeKey,
    pub offset: u64,
    pub bitfield: Option<Bitfield>,
    pub address: Option<Address>,
    pub value: Option<PrimitiveValue>,
    pub inherited_from: Option<TypeKey>,
}

impl UdtMember
{
    pub fn is_inherited(&self) -> bool
    {
        self.inherited_from.is_some()
    }
}

/// Children of a UDT, bucketed by variant
///
/// Built once per UDT and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UdtChildren
{
    /// Data members in declaration order, including inherited ones
    pub members: Vec<UdtMember>,
    pub static_members: Vec<UdtMember>,
    /// `BaseClass` nodes
    pub base_classes: Vec<TypeKey>,
    /// `VirtualBaseClass` nodes
    pub virtual_base_classes: Vec<TypeKey>,
    pub nested_types: Vec<TypeKey>,
    pub nested_enums: Vec<TypeKey>,
    pub typedefs: Vec<TypeKey>,
    pub functions: Vec<TypeKey>,
    pub vtable: Option<TypeKey>,
}

impl UdtChildren
{
    /// Look up a data member by name, preferring direct members over
    /// inherited ones.
    pub fn member(&self, name: &str) -> Option<&UdtMember>
    {
        self.members
            .iter()
            .find(|member| !member.is_inherited() && member.name == name)
            .or_else(|| self.members.iter().find(|member| member.name == name))
    }

    pub fn static_member(&self, name: &str) -> Option<&UdtMember>
    {
        self.static_members
            .iter()
            .find(|member| !member.is_inherited() && member.name == name)
            .or_else(|| self.static_members.iter().find(|member| member.name == name))
    }

    /// Members declared by the UDT itself.
    pub fn direct_members(&self) -> impl Iterator<Item = &UdtMember>
    {
        self.members.iter().filter(|member| !member.is_inherited())
    }

    pub fn has_virtual_bases(&self) -> bool
    {
        !self.virtual_base_classes.is_empty()
    }
}

/// Named value of an enum
#[derive(Debug, Clone, PartialEq)]
pub struct Enumerand
{
    pub name: String,
    pub value: PrimitiveValue,
}
