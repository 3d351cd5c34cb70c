//! Instance layouts: vtable pointers interleaved with data members.

use super::udt::UdtMember;
use crate::types::TypeKey;

/// Order in which [`InstanceLayout`] items are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutOrder
{
    /// Source order, each vtable placed before the first member past it
    #[default]
    Declaration,
    /// Ascending offset, ties kept in declaration order
    Offset,
}

/// A vtable found in a UDT or one of its non-virtual bases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableHit
{
    /// The `VTable` node
    pub vtable: TypeKey,
    /// Offset of the vtable pointer from the start of the searched UDT
    pub cumulative_offset: u64,
    /// Base classes walked to reach the vtable, outermost first
    pub path: Vec<TypeKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutItemKind
{
    VTable(VTableHit),
    Member(UdtMember),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem
{
    pub offset: u64,
    pub size: u64,
    pub kind: LayoutItemKind,
}

impl LayoutItem
{
    pub fn is_vtable(&self) -> bool
    {
        matches!(self.kind, LayoutItemKind::VTable(_))
    }

    /// Member name, or `None` for vtable pointers.
    pub fn member_name(&self) -> Option<&str>
    {
        match &self.kind {
            LayoutItemKind::Member(member) => Some(&member.name),
            LayoutItemKind::VTable(_) => None,
        }
    }
}

/// Ordered items making up one instance of a UDT
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceLayout
{
    items: Vec<LayoutItem>,
    order: LayoutOrder,
    declared_size: u64,
}

impl InstanceLayout
{
    pub(crate) fn new(items: Vec<LayoutItem>, order: LayoutOrder, declared_size: u64) -> Self
    {
        Self {
            items,
            order,
            declared_size,
        }
    }

    pub fn items(&self) -> &[LayoutItem]
    {
        &self.items
    }

    pub fn order(&self) -> LayoutOrder
    {
        self.order
    }

    /// Size recorded for the UDT; this is the authoritative size.
    pub fn declared_size(&self) -> u64
    {
        self.declared_size
    }

    /// One past the last byte covered by any item.
    pub fn extent(&self) -> u64
    {
        self.items
            .iter()
            .map(|item| item.offset.saturating_add(item.size))
            .max()
            .unwrap_or(0)
    }

    /// Copy of this layout sorted by `(offset, original index)`.
    ///
    /// The index keeps equal-offset items (union members, bitfields sharing
    /// a storage unit) in their original relative order.
    #[must_use]
    pub fn sort_by_offset(&self) -> InstanceLayout
    {
        let mut indexed: Vec<(usize, &LayoutItem)> = self.items.iter().enumerate().collect();
        indexed.sort_by_key(|(index, item)| (item.offset, *index));
        InstanceLayout {
            items: indexed.into_iter().map(|(_, item)| item.clone()).collect(),
            order: LayoutOrder::Offset,
            declared_size: self.declared_size,
        }
    }
}
