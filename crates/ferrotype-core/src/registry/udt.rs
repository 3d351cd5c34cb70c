//! UDT population, member lookup and vtable discovery.

use std::sync::Arc;

use super::TypeRegistry;
use crate::error::{TypeError, TypeResult};
use crate::model::{BaseClass, TypeNode, TypeNodeKind, UdtChildren, UdtMember, UdtType, VTableHit};
use crate::session::{DebuggerSession, SymTag};
use crate::types::TypeKey;

impl<S: DebuggerSession> TypeRegistry<S>
{
    /// Children of a UDT, bucketed by kind and populated on first request.
    ///
    /// Members of non-virtual base classes are projected into `members` with
    /// their offsets shifted by the base offset. Members reached through a
    /// virtual base are never projected, since their offset is only known at
    /// run time.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `node` is not a UDT, plus any session error hit
    /// while resolving the children.
    pub fn udt_children(&self, node: &TypeNode) -> TypeResult<Arc<UdtChildren>>
    {
        self.udt_children_within(node, &mut Vec::new())
    }

    /// `populating` holds the UDTs whose population is on the current call
    /// chain; a base found there closes an inheritance cycle.
    fn udt_children_within(&self, node: &TypeNode, populating: &mut Vec<TypeKey>) -> TypeResult<Arc<UdtChildren>>
    {
        let Some(udt) = node.as_udt() else {
            return Err(not_a_udt(node));
        };
        if let Some(children) = node.cache.children.get() {
            return Ok(Arc::clone(children));
        }
        populating.push(node.key());
        let children = node
            .cache
            .children
            .get_or_try_init(|| self.populate_udt(node, udt, populating).map(Arc::new))
            .cloned();
        populating.pop();
        children
    }

    fn populate_udt(&self, node: &TypeNode, udt: &UdtType, populating: &mut Vec<TypeKey>) -> TypeResult<UdtChildren>
    {
        let key = node.key();
        let ids = self.session.children_ids(key.module, key.type_id, udt.child_count)?;
        let mut children = UdtChildren::default();

        for id in ids {
            let child_key = key.sibling(id);
            let tag = self.session.sym_tag(key.module, id)?;
            match tag {
                SymTag::Data => {
                    let child = self.node(child_key)?;
                    match child.kind() {
                        TypeNodeKind::DataMember(member) => children.members.push(UdtMember {
                            name: member.name.clone(),
                            member: child_key,
                            member_type: member.member_type,
                            offset: member.offset,
                            bitfield: member.bitfield,
                            address: None,
                            value: None,
                            inherited_from: None,
                        }),
                        TypeNodeKind::StaticDataMember(member) => children.static_members.push(UdtMember {
                            name: member.name.clone(),
                            member: child_key,
                            member_type: member.member_type,
                            offset: 0,
                            bitfield: None,
                            address: member.address,
                            value: member.value,
                            inherited_from: None,
                        }),
                        other => self.defect(&format!("data record {child_key} resolved to a {other}")),
                    }
                }
                SymTag::BaseClass => {
                    let child = self.node(child_key)?;
                    match child.kind() {
                        TypeNodeKind::BaseClass(base) => {
                            children.base_classes.push(child_key);
                            self.project_base(node, base, &mut children, populating)?;
                        }
                        TypeNodeKind::VirtualBaseClass(_) => children.virtual_base_classes.push(child_key),
                        other => self.defect(&format!("base class record {child_key} resolved to a {other}")),
                    }
                }
                SymTag::Udt => children.nested_types.push(child_key),
                SymTag::Enum => children.nested_enums.push(child_key),
                SymTag::Typedef => children.typedefs.push(child_key),
                SymTag::Function => children.functions.push(child_key),
                SymTag::VTable => {
                    if let Some(existing) = children.vtable {
                        tracing::warn!(udt = %udt.name, %existing, extra = %child_key, "UDT has more than one vtable");
                    } else {
                        children.vtable = Some(child_key);
                    }
                }
                other => {
                    self.diagnostics.unhandled_child(SymTag::Udt, other, &udt.name);
                }
            }
        }

        tracing::debug!(
            udt = %udt.name,
            members = children.members.len(),
            bases = children.base_classes.len(),
            virtual_bases = children.virtual_base_classes.len(),
            "populated UDT children"
        );
        Ok(children)
    }

    /// Copy a non-virtual base's members into `children`.
    fn project_base(
        &self,
        derived: &TypeNode,
        base: &BaseClass,
        children: &mut UdtChildren,
        populating: &mut Vec<TypeKey>,
    ) -> TypeResult<()>
    {
        let base_node = self.strip_typedefs(self.node(base.base_type)?)?;
        if base_node.key() == derived.key() {
            tracing::warn!(udt = %derived.key(), "UDT lists itself as a base class; skipping");
            return Ok(());
        }
        if populating.contains(&base_node.key()) {
            tracing::warn!(udt = %derived.key(), base = %base_node.key(), "inheritance cycle; skipping base");
            return Ok(());
        }
        if !base_node.is_udt() {
            tracing::warn!(
                udt = %derived.key(),
                base = %base_node.key(),
                kind = base_node.kind_name(),
                "base class is not a UDT; skipping"
            );
            return Ok(());
        }

        let base_children = self.udt_children_within(&base_node, populating)?;
        let base_key = base_node.key();
        children
            .members
            .extend(base_children.members.iter().map(|member| UdtMember {
                offset: member.offset.saturating_add(base.offset),
                inherited_from: Some(base_key),
                ..member.clone()
            }));
        children
            .static_members
            .extend(base_children.static_members.iter().map(|member| UdtMember {
                inherited_from: Some(base_key),
                ..member.clone()
            }));
        Ok(())
    }

    /// Look up a data member of a UDT by name.
    ///
    /// Direct members win over inherited ones with the same name.
    pub fn member(&self, node: &TypeNode, name: &str) -> TypeResult<Option<UdtMember>>
    {
        Ok(self.udt_children(node)?.member(name).cloned())
    }

    /// All data members of a UDT, inherited ones included.
    ///
    /// ## Errors
    ///
    /// `Unsupported` if the UDT has virtual bases: their members sit at an
    /// offset that is only known for a live instance.
    pub fn all_members(&self, node: &TypeNode) -> TypeResult<Vec<UdtMember>>
    {
        let children = self.udt_children(node)?;
        if children.has_virtual_bases() {
            return Err(TypeError::Unsupported(format!(
                "member aggregation through virtual base classes of {}",
                self.name(node)?
            )));
        }
        Ok(children.members.clone())
    }

    /// Every vtable reachable from a UDT through non-virtual bases.
    ///
    /// The UDT's own vtable comes first, followed by those of its bases in
    /// declaration order, depth first. Offsets are relative to the start of
    /// `node`.
    pub fn find_vtables(&self, node: &TypeNode) -> TypeResult<Vec<VTableHit>>
    {
        let mut hits = Vec::new();
        self.collect_vtables(node, 0, &[node.key()], &mut hits)?;
        Ok(hits)
    }

    /// `lineage` is the searched UDT followed by the bases walked to reach
    /// `node`, outermost first.
    fn collect_vtables(
        &self,
        node: &TypeNode,
        base_offset: u64,
        lineage: &[TypeKey],
        hits: &mut Vec<VTableHit>,
    ) -> TypeResult<()>
    {
        let children = self.udt_children(node)?;

        if let Some(vtable_key) = children.vtable {
            let vtable = self.node(vtable_key)?;
            let own_offset = match vtable.kind() {
                TypeNodeKind::VTable(vtable) => vtable.offset,
                other => {
                    self.defect(&format!("vtable slot {vtable_key} holds a {other}"));
                    0
                }
            };
            hits.push(VTableHit {
                vtable: vtable_key,
                cumulative_offset: base_offset.saturating_add(own_offset),
                path: lineage.get(1..).unwrap_or_default().to_vec(),
            });
        }

        for base_key in &children.base_classes {
            let base_class = self.node(*base_key)?;
            let TypeNodeKind::BaseClass(base) = base_class.kind() else {
                continue;
            };
            let base_node = self.strip_typedefs(self.node(base.base_type)?)?;
            if base_node.key() == node.key() || !base_node.is_udt() {
                continue;
            }
            if lineage.contains(&base_node.key()) {
                tracing::warn!(udt = %node.key(), base = %base_node.key(), "inheritance cycle; not searching base");
                continue;
            }
            let mut base_lineage = lineage.to_vec();
            base_lineage.push(base_node.key());
            self.collect_vtables(&base_node, base_offset.saturating_add(base.offset), &base_lineage, hits)?;
        }
        Ok(())
    }

    /// Byte offset of a dotted member path such as `"header.flags"`.
    ///
    /// Typedefs along the path are looked through. The path may not pass
    /// through a pointer or a non-UDT member.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: empty path or empty segment
    /// - `MemberNotFound`: a segment names no member
    /// - `Unsupported`: a segment names no member and the type has virtual
    ///   bases, where the member may live
    /// - `PointerInPath` / `NotAUdt`: a segment continues through a member
    ///   that is not a UDT
    pub fn find_member_offset(&self, node: &Arc<TypeNode>, path: &str) -> TypeResult<u64>
    {
        if path.trim().is_empty() {
            return Err(TypeError::InvalidArgument("member path is empty".to_string()));
        }

        let mut current = self.strip_typedefs(Arc::clone(node))?;
        let mut offset = 0u64;
        let mut consumed = String::new();

        for segment in path.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(TypeError::InvalidArgument(format!("member path {path:?} has an empty segment")));
            }

            match current.kind() {
                TypeNodeKind::Udt(_) => {}
                TypeNodeKind::Pointer(_) => return Err(TypeError::PointerInPath { path: consumed }),
                _ => {
                    return Err(TypeError::NotAUdt {
                        path: consumed,
                        type_name: self.name(&current)?.to_string(),
                    });
                }
            }

            let children = self.udt_children(&current)?;
            let Some(member) = children.member(segment) else {
                let type_name = self.name(&current)?.to_string();
                if children.has_virtual_bases() {
                    return Err(TypeError::Unsupported(format!(
                        "member {segment} of {type_name} may live in a virtual base"
                    )));
                }
                return Err(TypeError::MemberNotFound {
                    type_name,
                    member: segment.to_string(),
                });
            };

            offset = offset.saturating_add(member.offset);
            if !consumed.is_empty() {
                consumed.push('.');
            }
            consumed.push_str(segment);
            let next = self.strip_typedefs(self.node(member.member_type)?)?;
            current = next;
        }

        Ok(offset)
    }
}

fn not_a_udt(node: &TypeNode) -> TypeError
{
    TypeError::InvalidArgument(format!("{} is a {}, not a UDT", node.key(), node.kind_name()))
}
