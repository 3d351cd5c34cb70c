//! Tests for decoding DWARF from a small ELF image built in memory

use std::env;
use std::fs;
use std::path::PathBuf;

use ferrotype_core::prelude::*;
use gimli::constants::{self, DwAt, DwTag};
use gimli::write::{self, AttributeValue, DwarfUnit, EndianVec, Expression, Sections, Unit, UnitEntryId};
use gimli::{Encoding, Format, LittleEndian};
use object::{Architecture, BinaryFormat, Endianness, SectionKind};

const MODULE: ModuleBase = ModuleBase(0x1_4000_0000);
const COUNT_ADDRESS: u64 = 0x4000;

fn name(text: &str) -> AttributeValue
{
    AttributeValue::String(text.as_bytes().to_vec())
}

fn add(unit: &mut Unit, parent: UnitEntryId, tag: DwTag, attrs: Vec<(DwAt, AttributeValue)>) -> UnitEntryId
{
    let id = unit.add(parent, tag);
    let entry = unit.get_mut(id);
    for (attr, value) in attrs {
        entry.set(attr, value);
    }
    id
}

fn uconst_expression(op: fn(&mut Expression, u64), value: u64) -> AttributeValue
{
    let mut expression = Expression::new();
    op(&mut expression, value);
    AttributeValue::Exprloc(expression)
}

/// `class Widget` with a vtable, bitfields in both encodings, a two-dimensional
/// array, a static member defined out of line, and a forward declaration.
fn debug_info() -> DwarfUnit
{
    let mut dwarf = DwarfUnit::new(Encoding {
        format: Format::Dwarf32,
        version: 4,
        address_size: 8,
    });
    let unit = &mut dwarf.unit;
    let root = unit.root();

    let int = add(unit, root, constants::DW_TAG_base_type, vec![
        (constants::DW_AT_name, name("int")),
        (constants::DW_AT_encoding, AttributeValue::Encoding(constants::DW_ATE_signed)),
        (constants::DW_AT_byte_size, AttributeValue::Udata(4)),
    ]);
    let unsigned = add(unit, root, constants::DW_TAG_base_type, vec![
        (constants::DW_AT_name, name("unsigned int")),
        (constants::DW_AT_encoding, AttributeValue::Encoding(constants::DW_ATE_unsigned)),
        (constants::DW_AT_byte_size, AttributeValue::Udata(4)),
    ]);
    let int_ptr = add(unit, root, constants::DW_TAG_pointer_type, vec![
        (constants::DW_AT_type, AttributeValue::UnitRef(int)),
        (constants::DW_AT_byte_size, AttributeValue::Udata(8)),
    ]);
    let grid = add(unit, root, constants::DW_TAG_array_type, vec![
        (constants::DW_AT_type, AttributeValue::UnitRef(int)),
        (constants::DW_AT_byte_size, AttributeValue::Udata(24)),
    ]);
    add(unit, grid, constants::DW_TAG_subrange_type, vec![(constants::DW_AT_count, AttributeValue::Udata(2))]);
    add(unit, grid, constants::DW_TAG_subrange_type, vec![(constants::DW_AT_upper_bound, AttributeValue::Udata(2))]);

    add(unit, root, constants::DW_TAG_structure_type, vec![
        (constants::DW_AT_name, name("Widget")),
        (constants::DW_AT_declaration, AttributeValue::Flag(true)),
    ]);
    let widget = add(unit, root, constants::DW_TAG_class_type, vec![
        (constants::DW_AT_name, name("Widget")),
        (constants::DW_AT_byte_size, AttributeValue::Udata(40)),
    ]);
    add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("_vptr.Widget")),
        (constants::DW_AT_type, AttributeValue::UnitRef(int_ptr)),
        (constants::DW_AT_data_member_location, AttributeValue::Udata(0)),
        (constants::DW_AT_artificial, AttributeValue::Flag(true)),
    ]);
    add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("low")),
        (constants::DW_AT_type, AttributeValue::UnitRef(unsigned)),
        (constants::DW_AT_bit_size, AttributeValue::Udata(3)),
        (constants::DW_AT_data_bit_offset, AttributeValue::Udata(64)),
    ]);
    add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("high")),
        (constants::DW_AT_type, AttributeValue::UnitRef(unsigned)),
        (constants::DW_AT_bit_size, AttributeValue::Udata(5)),
        (constants::DW_AT_data_bit_offset, AttributeValue::Udata(67)),
    ]);
    add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("legacy")),
        (constants::DW_AT_type, AttributeValue::UnitRef(unsigned)),
        (constants::DW_AT_byte_size, AttributeValue::Udata(4)),
        (constants::DW_AT_bit_size, AttributeValue::Udata(4)),
        (constants::DW_AT_bit_offset, AttributeValue::Udata(26)),
        (constants::DW_AT_data_member_location, AttributeValue::Udata(12)),
    ]);
    add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("grid")),
        (constants::DW_AT_type, AttributeValue::UnitRef(grid)),
        (constants::DW_AT_data_member_location, uconst_expression(Expression::op_plus_uconst, 16)),
    ]);
    let count = add(unit, widget, constants::DW_TAG_member, vec![
        (constants::DW_AT_name, name("count")),
        (constants::DW_AT_type, AttributeValue::UnitRef(int)),
        (constants::DW_AT_external, AttributeValue::Flag(true)),
        (constants::DW_AT_declaration, AttributeValue::Flag(true)),
    ]);
    add(unit, widget, constants::DW_TAG_subprogram, vec![
        (constants::DW_AT_name, name("draw")),
        (constants::DW_AT_virtuality, AttributeValue::Virtuality(constants::DW_VIRTUALITY_virtual)),
        (constants::DW_AT_vtable_elem_location, uconst_expression(Expression::op_constu, 0)),
    ]);
    add(unit, widget, constants::DW_TAG_subprogram, vec![
        (constants::DW_AT_name, name("resize")),
        (constants::DW_AT_virtuality, AttributeValue::Virtuality(constants::DW_VIRTUALITY_virtual)),
        (constants::DW_AT_vtable_elem_location, uconst_expression(Expression::op_constu, 2)),
    ]);

    let mut location = Expression::new();
    location.op_addr(write::Address::Constant(COUNT_ADDRESS));
    add(unit, root, constants::DW_TAG_variable, vec![
        (constants::DW_AT_specification, AttributeValue::UnitRef(count)),
        (constants::DW_AT_location, AttributeValue::Exprloc(location)),
    ]);

    dwarf
}

/// Write the debug sections into an ELF relocatable and return its path.
fn write_image(tag: &str) -> PathBuf
{
    let mut sections = Sections::new(EndianVec::new(LittleEndian));
    debug_info().write(&mut sections).unwrap();

    let mut image = object::write::Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    sections
        .for_each(|id, data| {
            if !data.slice().is_empty() {
                let section = image.add_section(Vec::new(), id.name().as_bytes().to_vec(), SectionKind::Debug);
                image.set_section_data(section, data.slice().to_vec(), 1);
            }
            Ok::<(), write::Error>(())
        })
        .unwrap();

    let path = env::temp_dir().join(format!("ferrotype-dwarf-{tag}-{}.o", std::process::id()));
    fs::write(&path, image.write().unwrap()).unwrap();
    path
}

fn load(tag: &str) -> TypeRegistry<DwarfSession>
{
    let path = write_image(tag);
    let session = DwarfSession::load(
        &path,
        DwarfSessionOptions {
            load_address: MODULE.0,
        },
    )
    .unwrap();
    fs::remove_file(&path).ok();
    TypeRegistry::new(session)
}

fn widget(registry: &TypeRegistry<DwarfSession>) -> std::sync::Arc<TypeNode>
{
    let ids = registry.session().find_types("Widget").unwrap();
    assert_eq!(ids.len(), 1);
    registry.resolve(MODULE, ids[0]).unwrap()
}

#[test]
fn test_find_types_prefers_definition_over_declaration()
{
    let registry = load("find");
    let session = registry.session();

    assert_eq!(session.module(), MODULE);
    assert_eq!(session.type_names().filter(|name| *name == "Widget").count(), 2);
    assert_eq!(session.find_types("widget").unwrap(), session.find_types("Widget").unwrap());

    let node = widget(&registry);
    assert_eq!(registry.name(&node).unwrap(), "Widget");
    assert_eq!(registry.size(&node).unwrap(), 40);
}

#[test]
fn test_bitfields_decode_from_both_bit_offset_forms()
{
    let registry = load("bitfields");
    let node = widget(&registry);

    let low = registry.member(&node, "low").unwrap().unwrap();
    assert_eq!(low.offset, 8);
    assert_eq!(low.bitfield, Some(Bitfield::new(3, 0)));

    let high = registry.member(&node, "high").unwrap().unwrap();
    assert_eq!(high.offset, 8);
    assert_eq!(high.bitfield, Some(Bitfield::new(5, 3)));

    // Counted from the most significant bit: 32 - (26 + 4).
    let legacy = registry.member(&node, "legacy").unwrap().unwrap();
    assert_eq!(legacy.offset, 12);
    assert_eq!(legacy.bitfield, Some(Bitfield::new(4, 2)));
}

#[test]
fn test_artificial_vptr_becomes_vtable_with_slot_count()
{
    let registry = load("vtable");
    let node = widget(&registry);

    let hits = registry.find_vtables(&node).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].cumulative_offset, 0);
    assert!(hits[0].path.is_empty());

    let session = registry.session();
    let vtable = session.vtable_info(MODULE, hits[0].vtable.type_id).unwrap();
    assert_eq!(vtable.offset, 0);
    assert_eq!(session.vtable_shape_info(MODULE, vtable.vtable_shape_id).unwrap().slot_count, 3);
}

#[test]
fn test_subranges_become_nested_arrays()
{
    let registry = load("arrays");
    let node = widget(&registry);

    let grid = registry.member(&node, "grid").unwrap().unwrap();
    assert_eq!(grid.offset, 16);
    let array = registry.node(grid.member_type).unwrap();
    assert_eq!(registry.name(&array).unwrap(), "int[2][3]");
    assert_eq!(registry.size(&array).unwrap(), 24);
}

#[test]
fn test_out_of_line_definition_gives_static_member_its_address()
{
    let registry = load("statics");
    let node = widget(&registry);

    let children = registry.udt_children(&node).unwrap();
    let count = children.static_member("count").unwrap();
    assert_eq!(count.address, Some(Address::new(MODULE.0 + COUNT_ADDRESS)));
    assert!(children.member("count").is_none());
}
