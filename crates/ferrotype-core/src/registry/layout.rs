//! Instance layouts.

use std::sync::Arc;

use super::TypeRegistry;
use crate::error::{TypeError, TypeResult};
use crate::model::{InstanceLayout, LayoutItem, LayoutItemKind, LayoutOrder, TypeNode};
use crate::session::DebuggerSession;

impl<S: DebuggerSession> TypeRegistry<S>
{
    /// Items of one UDT instance: data members plus vtable pointers.
    ///
    /// In declaration order each vtable pointer is placed before the first
    /// data member with a strictly greater offset. Offset order is the same
    /// items stably sorted by offset. Both orders are memoized separately.
    ///
    /// Static members occupy no instance storage and are not listed.
    pub fn layout(&self, node: &TypeNode, order: LayoutOrder) -> TypeResult<Arc<InstanceLayout>>
    {
        match order {
            LayoutOrder::Declaration => node
                .cache
                .declaration_layout
                .get_or_try_init(|| self.declaration_layout(node).map(Arc::new))
                .cloned(),
            LayoutOrder::Offset => node
                .cache
                .offset_layout
                .get_or_try_init(|| {
                    let declared = self.layout(node, LayoutOrder::Declaration)?;
                    Ok(Arc::new(declared.sort_by_offset()))
                })
                .cloned(),
        }
    }

    fn declaration_layout(&self, node: &TypeNode) -> TypeResult<InstanceLayout>
    {
        let Some(udt) = node.as_udt() else {
            return Err(TypeError::InvalidArgument(format!(
                "{} is a {}, not a UDT",
                node.key(),
                node.kind_name()
            )));
        };

        let children = self.udt_children(node)?;
        let mut items = Vec::with_capacity(children.members.len() + 1);
        for member in &children.members {
            let member_type = self.node(member.member_type)?;
            items.push(LayoutItem {
                offset: member.offset,
                size: self.size(&member_type)?,
                kind: LayoutItemKind::Member(member.clone()),
            });
        }

        let pointer_size = self.pointer_size();
        for hit in self.find_vtables(node)? {
            let position = items
                .iter()
                .position(|item| !item.is_vtable() && item.offset > hit.cumulative_offset)
                .unwrap_or(items.len());
            items.insert(
                position,
                LayoutItem {
                    offset: hit.cumulative_offset,
                    size: pointer_size,
                    kind: LayoutItemKind::VTable(hit),
                },
            );
        }

        let layout = InstanceLayout::new(items, LayoutOrder::Declaration, udt.size);
        let extent = layout.extent();
        if extent > udt.size {
            if self.options.warn_on_size_mismatch {
                tracing::warn!(udt = %udt.name, declared = udt.size, extent, "layout extends past the declared size");
            }
        } else if extent < udt.size {
            tracing::debug!(udt = %udt.name, declared = udt.size, extent, "trailing padding");
        }
        Ok(layout)
    }
}
