//! Structural equality across modules.
//!
//! Two nodes from different modules never share a key, but usually describe
//! the same source type. These comparisons look at names, sizes and member
//! shapes instead of identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::TypeRegistry;
use crate::error::TypeResult;
use crate::model::{TypeNode, TypeNodeKind, UdtChildren};
use crate::session::DebuggerSession;
use crate::value::Bitfield;

type MemberShape = (String, u64, Option<Bitfield>, String);

impl<S: DebuggerSession> TypeRegistry<S>
{
    /// Whether two nodes describe the same type.
    ///
    /// UDTs whose names fall in the same interface synonym set are equal
    /// regardless of contents. Other UDTs compare name, kind, size, bases
    /// and data members. Base types compare tag and width; everything else
    /// compares its display name.
    pub fn structurally_equal(&self, a: &TypeNode, b: &TypeNode) -> TypeResult<bool>
    {
        if a.key() == b.key() {
            return Ok(true);
        }
        if std::mem::discriminant(a.kind()) != std::mem::discriminant(b.kind()) {
            return Ok(false);
        }

        match (a.kind(), b.kind()) {
            (TypeNodeKind::Udt(left), TypeNodeKind::Udt(right)) => {
                if let (Some(x), Some(y)) = (
                    self.options.synonym_set(&left.name),
                    self.options.synonym_set(&right.name),
                ) {
                    return Ok(x == y);
                }
                if left.name != right.name || left.kind != right.kind || left.size != right.size {
                    return Ok(false);
                }
                let left_children = self.udt_children(a)?;
                let right_children = self.udt_children(b)?;
                Ok(self.base_shapes(&left_children)? == self.base_shapes(&right_children)?
                    && self.member_shapes(&left_children)? == self.member_shapes(&right_children)?)
            }
            (TypeNodeKind::Base(left), TypeNodeKind::Base(right)) => {
                Ok(left.basic_type == right.basic_type && left.size == right.size)
            }
            (TypeNodeKind::Generated(left), TypeNodeKind::Generated(right)) => Ok(left == right),
            (TypeNodeKind::Null, TypeNodeKind::Null) => Ok(true),
            _ => Ok(self.name(a)? == self.name(b)? && self.size(a)? == self.size(b)?),
        }
    }

    /// Hash consistent with [`TypeRegistry::structurally_equal`].
    pub fn structural_hash(&self, node: &TypeNode) -> TypeResult<u64>
    {
        let mut hasher = DefaultHasher::new();
        node.kind_name().hash(&mut hasher);
        match node.kind() {
            TypeNodeKind::Udt(udt) => match self.options.synonym_set(&udt.name) {
                Some(set) => set.hash(&mut hasher),
                None => {
                    udt.name.hash(&mut hasher);
                    udt.size.hash(&mut hasher);
                }
            },
            TypeNodeKind::Base(base) => {
                base.basic_type.hash(&mut hasher);
                base.size.hash(&mut hasher);
            }
            TypeNodeKind::Null => {}
            _ => {
                self.name(node)?.hash(&mut hasher);
                self.size(node)?.hash(&mut hasher);
            }
        }
        Ok(hasher.finish())
    }

    fn base_shapes(&self, children: &UdtChildren) -> TypeResult<Vec<(String, Option<u64>)>>
    {
        let mut shapes = Vec::new();
        for key in children.base_classes.iter().chain(&children.virtual_base_classes) {
            let base = self.node(*key)?;
            let offset = match base.kind() {
                TypeNodeKind::BaseClass(base) => Some(base.offset),
                _ => None,
            };
            shapes.push((self.name(&base)?.to_string(), offset));
        }
        Ok(shapes)
    }

    fn member_shapes(&self, children: &UdtChildren) -> TypeResult<Vec<MemberShape>>
    {
        let mut shapes = Vec::new();
        for member in children.direct_members() {
            let member_type = self.node(member.member_type)?;
            shapes.push((
                member.name.clone(),
                member.offset,
                member.bitfield,
                self.name(&member_type)?.to_string(),
            ));
        }
        Ok(shapes)
    }
}
