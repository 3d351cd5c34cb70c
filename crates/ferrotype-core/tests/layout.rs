//! Tests for vtable discovery and instance layouts

use std::sync::Arc;

use ferrotype_core::prelude::*;

const MODULE: ModuleBase = ModuleBase(0x1_4000_0000);

#[test]
fn test_vtable_found_only_in_second_base()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let a = session.add_udt(MODULE, "A", UdtKind::Struct, 8);
    session.add_member(MODULE, a, "a", int, 0);
    let b = session.add_udt(MODULE, "B", UdtKind::Class, 16);
    let b_vtable = session.add_vtable(MODULE, b, 2, 0);
    session.add_member(MODULE, b, "b", int, 8);
    let c = session.add_udt(MODULE, "C", UdtKind::Class, 24);
    session.add_base_class(MODULE, c, a, 0);
    session.add_base_class(MODULE, c, b, 8);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, c).unwrap();
    let hits = registry.find_vtables(&node).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cumulative_offset, 8);
    assert_eq!(hits[0].vtable, TypeKey::new(MODULE, b_vtable));
    assert_eq!(hits[0].path, vec![TypeKey::new(MODULE, b)]);
}

#[test]
fn test_own_vtable_comes_first_with_empty_path()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let base = session.add_udt(MODULE, "Base", UdtKind::Class, 8);
    session.add_vtable(MODULE, base, 1, 0);
    let derived = session.add_udt(MODULE, "Derived", UdtKind::Class, 16);
    let own = session.add_vtable(MODULE, derived, 3, 0);
    session.add_base_class(MODULE, derived, base, 8);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, derived).unwrap();
    let hits = registry.find_vtables(&node).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].vtable, TypeKey::new(MODULE, own));
    assert_eq!(hits[0].cumulative_offset, 0);
    assert!(hits[0].path.is_empty());
    assert_eq!(hits[1].cumulative_offset, 8);
}

#[test]
fn test_vtable_path_lists_outermost_base_first()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let root = session.add_udt(MODULE, "Root", UdtKind::Class, 8);
    session.add_vtable(MODULE, root, 1, 0);
    let middle = session.add_udt(MODULE, "Middle", UdtKind::Class, 16);
    session.add_base_class(MODULE, middle, root, 8);
    let leaf = session.add_udt(MODULE, "Leaf", UdtKind::Class, 32);
    session.add_base_class(MODULE, leaf, middle, 16);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, leaf).unwrap();
    let hits = registry.find_vtables(&node).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cumulative_offset, 24);
    assert_eq!(
        hits[0].path,
        vec![TypeKey::new(MODULE, middle), TypeKey::new(MODULE, root)]
    );
}

#[test]
fn test_virtual_bases_are_not_searched_for_vtables()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let shared = session.add_udt(MODULE, "Shared", UdtKind::Class, 8);
    session.add_vtable(MODULE, shared, 1, 0);
    let user = session.add_udt(MODULE, "User", UdtKind::Class, 24);
    session.add_virtual_base_class(MODULE, user, shared, 1, 0, false);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, user).unwrap();

    assert!(registry.find_vtables(&node).unwrap().is_empty());
}

#[test]
fn test_declaration_layout_places_vtable_before_first_later_member()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let a = session.add_udt(MODULE, "A", UdtKind::Struct, 8);
    session.add_member(MODULE, a, "a", int, 0);
    let b = session.add_udt(MODULE, "B", UdtKind::Class, 16);
    session.add_vtable(MODULE, b, 2, 0);
    session.add_member(MODULE, b, "b", int, 8);
    let c = session.add_udt(MODULE, "C", UdtKind::Class, 24);
    session.add_base_class(MODULE, c, a, 0);
    session.add_base_class(MODULE, c, b, 8);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, c).unwrap();
    let layout = registry.layout(&node, LayoutOrder::Declaration).unwrap();
    let items = layout.items();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].member_name(), Some("a"));
    assert!(items[1].is_vtable());
    assert_eq!(items[1].offset, 8);
    assert_eq!(items[1].size, 8);
    assert_eq!(items[2].member_name(), Some("b"));
    assert_eq!(items[2].offset, 16);
    assert_eq!(items[2].size, 4);
    assert_eq!(layout.declared_size(), 24);
}

#[test]
fn test_vtable_item_size_follows_target_width()
{
    let mut session = MemorySession::new(TargetWidth::Bits32);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let widget = session.add_udt(MODULE, "Widget", UdtKind::Class, 8);
    session.add_vtable(MODULE, widget, 4, 0);
    session.add_member(MODULE, widget, "id", int, 4);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, widget).unwrap();
    let layout = registry.layout(&node, LayoutOrder::Declaration).unwrap();

    assert!(layout.items()[0].is_vtable());
    assert_eq!(layout.items()[0].size, 4);
    assert_eq!(layout.extent(), 8);
}

#[test]
fn test_offset_layout_sorts_and_keeps_union_ties_stable()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let float = session.add_base_type(MODULE, BasicType::Float, 4);
    let ch = session.add_base_type(MODULE, BasicType::Char, 1);
    let variant = session.add_udt(MODULE, "Variant", UdtKind::Union, 4);
    session.add_member(MODULE, variant, "i", int, 0);
    session.add_member(MODULE, variant, "f", float, 0);
    session.add_member(MODULE, variant, "c", ch, 0);
    let record = session.add_udt(MODULE, "Record", UdtKind::Struct, 16);
    session.add_member(MODULE, record, "tail", int, 12);
    session.add_member(MODULE, record, "value", variant, 4);
    session.add_member(MODULE, record, "kind", int, 0);

    let registry = TypeRegistry::new(session);

    let union = registry.resolve(MODULE, variant).unwrap();
    let sorted = registry.layout(&union, LayoutOrder::Offset).unwrap();
    let names: Vec<_> = sorted.items().iter().filter_map(|item| item.member_name()).collect();
    assert_eq!(names, vec!["i", "f", "c"]);

    let record = registry.resolve(MODULE, record).unwrap();
    let declared = registry.layout(&record, LayoutOrder::Declaration).unwrap();
    let names: Vec<_> = declared.items().iter().filter_map(|item| item.member_name()).collect();
    assert_eq!(names, vec!["tail", "value", "kind"]);

    let sorted = registry.layout(&record, LayoutOrder::Offset).unwrap();
    assert_eq!(sorted.order(), LayoutOrder::Offset);
    let names: Vec<_> = sorted.items().iter().filter_map(|item| item.member_name()).collect();
    assert_eq!(names, vec!["kind", "value", "tail"]);
    assert!(sorted.items().windows(2).all(|pair| pair[0].offset <= pair[1].offset));
}

#[test]
fn test_layouts_are_memoized_per_order()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let point = session.add_udt(MODULE, "Point", UdtKind::Struct, 8);
    session.add_member(MODULE, point, "y", int, 4);
    session.add_member(MODULE, point, "x", int, 0);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, point).unwrap();

    let declared = registry.layout(&node, LayoutOrder::Declaration).unwrap();
    let again = registry.layout(&node, LayoutOrder::Declaration).unwrap();
    let sorted = registry.layout(&node, LayoutOrder::Offset).unwrap();

    assert!(Arc::ptr_eq(&declared, &again));
    assert!(!Arc::ptr_eq(&declared, &sorted));
    assert_eq!(declared.items()[0].member_name(), Some("y"));
    assert_eq!(sorted.items()[0].member_name(), Some("x"));
}

#[test]
fn test_size_mismatch_is_tolerated()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let short = session.add_udt(MODULE, "Short", UdtKind::Struct, 4);
    session.add_member(MODULE, short, "a", int, 0);
    session.add_member(MODULE, short, "b", int, 4);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, short).unwrap();
    let layout = registry.layout(&node, LayoutOrder::Declaration).unwrap();

    assert_eq!(layout.items().len(), 2);
    assert_eq!(layout.extent(), 8);
    assert_eq!(layout.declared_size(), 4);
    assert_eq!(registry.size(&node).unwrap(), 4);
}

#[test]
fn test_static_members_are_not_in_layout()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let counter = session.add_udt(MODULE, "Counter", UdtKind::Class, 4);
    session.add_static_member(MODULE, counter, "total", int, Address::new(0x9000));
    session.add_member(MODULE, counter, "value", int, 0);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, counter).unwrap();
    let layout = registry.layout(&node, LayoutOrder::Declaration).unwrap();

    assert_eq!(layout.items().len(), 1);
    assert_eq!(layout.items()[0].member_name(), Some("value"));
}

#[test]
fn test_layout_of_non_udt_is_invalid()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, int).unwrap();

    assert!(matches!(
        registry.layout(&node, LayoutOrder::Offset),
        Err(TypeError::InvalidArgument(_))
    ));
}

#[test]
fn test_vtable_search_stops_at_inheritance_cycle()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let a = session.add_udt(MODULE, "A", UdtKind::Class, 16);
    let a_vtable = session.add_vtable(MODULE, a, 1, 0);
    let b = session.add_udt(MODULE, "B", UdtKind::Class, 8);
    session.add_base_class(MODULE, a, b, 8);
    session.add_base_class(MODULE, b, a, 0);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, a).unwrap();
    let hits = registry.find_vtables(&node).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].vtable, TypeKey::new(MODULE, a_vtable));
    assert!(hits[0].path.is_empty());

    let layout = registry.layout(&node, LayoutOrder::Declaration).unwrap();
    assert_eq!(layout.items().len(), 1);
}
