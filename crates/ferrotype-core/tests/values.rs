//! Tests for primitive value reads

use ferrotype_core::prelude::*;
use ferrotype_core::value::coerce;

const MODULE: ModuleBase = ModuleBase(0x40_0000);
const OBJECT: u64 = 0x2000;

#[test]
fn test_coerce_unsigned_byte()
{
    assert_eq!(coerce(BasicType::UInt, 1, &[0xff]).unwrap(), PrimitiveValue::U8(255));
}

#[test]
fn test_coerce_unexpected_pair_fails()
{
    assert!(matches!(
        coerce(BasicType::Float, 2, &[0, 0]),
        Err(TypeError::UnexpectedBasicType { width: 2, .. })
    ));
}

#[test]
fn test_read_bitfield_members()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let byte = session.add_base_type(MODULE, BasicType::UInt, 1);
    let signed = session.add_base_type(MODULE, BasicType::Int, 1);
    let flag = session.add_base_type(MODULE, BasicType::Bool, 1);
    let flags = session.add_udt(MODULE, "Flags", UdtKind::Struct, 4);
    let mode = session.add_bitfield_member(MODULE, flags, "mode", byte, 0, Bitfield::new(3, 2));
    let delta = session.add_bitfield_member(MODULE, flags, "delta", signed, 0, Bitfield::new(3, 2));
    let ready = session.add_bitfield_member(MODULE, flags, "ready", flag, 0, Bitfield::new(1, 1));
    let busy = session.add_bitfield_member(MODULE, flags, "busy", flag, 0, Bitfield::new(1, 2));
    session.write_memory(Address::new(OBJECT), &[0b0001_1100, 0, 0, 0]);

    let registry = TypeRegistry::new(session);
    let object = Some(Address::new(OBJECT));
    let read = |id| {
        let node = registry.resolve(MODULE, id).unwrap();
        registry.read_data_value(&node, object).unwrap()
    };

    assert_eq!(read(mode), PrimitiveValue::U8(7));
    assert_eq!(read(delta), PrimitiveValue::I8(-1));
    assert_eq!(read(ready), PrimitiveValue::Bool(false));
    assert_eq!(read(busy), PrimitiveValue::Bool(true));
}

#[test]
fn test_constant_bypasses_memory()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let constant = session.add_constant(MODULE, None, "kLimit", int, PrimitiveValue::I32(42));

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, constant).unwrap();

    assert!(matches!(node.kind(), TypeNodeKind::StaticDataMember(_)));
    assert_eq!(registry.read_data_value(&node, None).unwrap(), PrimitiveValue::I32(42));
}

#[test]
fn test_static_and_global_read_from_their_address()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let counter = session.add_udt(MODULE, "Counter", UdtKind::Class, 4);
    let total = session.add_static_member(MODULE, counter, "total", int, Address::new(0x8000));
    let global = session.add_global(MODULE, "g_ticks", int, Address::new(0x8004));
    session.write_memory(Address::new(0x8000), &[5, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff]);

    let registry = TypeRegistry::new(session);
    let total = registry.resolve(MODULE, total).unwrap();
    let global = registry.resolve(MODULE, global).unwrap();

    assert_eq!(registry.read_data_value(&total, None).unwrap(), PrimitiveValue::I32(5));
    assert_eq!(registry.read_data_value(&global, None).unwrap(), PrimitiveValue::I32(-2));
}

#[test]
fn test_member_read_needs_object_address()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let point = session.add_udt(MODULE, "Point", UdtKind::Struct, 8);
    let x = session.add_member(MODULE, point, "x", int, 0);

    let registry = TypeRegistry::new(session);
    let x = registry.resolve(MODULE, x).unwrap();

    assert!(matches!(registry.read_data_value(&x, None), Err(TypeError::InvalidArgument(_))));
}

#[test]
fn test_inherited_member_read_uses_projected_offset()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let base = session.add_udt(MODULE, "B", UdtKind::Struct, 8);
    session.add_member(MODULE, base, "x", int, 4);
    let derived = session.add_udt(MODULE, "D", UdtKind::Struct, 24);
    session.add_base_class(MODULE, derived, base, 16);
    let mut bytes = vec![0u8; 24];
    bytes[20] = 0x2a;
    session.write_memory(Address::new(OBJECT), &bytes);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, derived).unwrap();
    let x = registry.member(&node, "x").unwrap().unwrap();

    assert_eq!(registry.read_member(&x, Address::new(OBJECT)).unwrap(), PrimitiveValue::I32(42));
}

#[test]
fn test_enum_reads_as_underlying_type()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let uint = session.add_base_type(MODULE, BasicType::UInt, 4);
    let color = session.add_enum(MODULE, "Color", uint, 4);
    session.add_enumerand(MODULE, color, "Red", PrimitiveValue::U32(0));
    session.add_enumerand(MODULE, color, "Green", PrimitiveValue::U32(1));
    session.add_enumerand(MODULE, color, "Blue", PrimitiveValue::U32(2));

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, color).unwrap();

    let value = registry
        .read_primitive(&node, &ValueLocation::Bytes(vec![2, 0, 0, 0]), None)
        .unwrap();
    assert_eq!(value, PrimitiveValue::U32(2));

    let enumerands = registry.enumerands(&node).unwrap();
    let names: Vec<_> = enumerands.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Red", "Green", "Blue"]);
    assert_eq!(enumerands[2].value, PrimitiveValue::U32(2));
}

#[test]
fn test_pointer_reads_as_unsigned_of_pointer_width()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let pointer = session.add_pointer(MODULE, int);
    let alias = session.add_typedef(MODULE, "PINT", pointer);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, alias).unwrap();
    let bytes = 0x7ffe_0000_1000u64.to_le_bytes().to_vec();

    assert_eq!(
        registry.read_primitive(&node, &ValueLocation::Bytes(bytes), None).unwrap(),
        PrimitiveValue::U64(0x7ffe_0000_1000)
    );
}

#[test]
fn test_register_location()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    session.set_register(0, &[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, int).unwrap();

    assert_eq!(
        registry.read_primitive(&node, &ValueLocation::Register(0), None).unwrap(),
        PrimitiveValue::I32(-1)
    );
    assert!(matches!(
        registry.read_primitive(&node, &ValueLocation::Register(7), None),
        Err(TypeError::Unsupported(_))
    ));
}

#[test]
fn test_read_failures()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let int = session.add_base_type(MODULE, BasicType::Int, 4);
    let point = session.add_udt(MODULE, "Point", UdtKind::Struct, 8);

    let registry = TypeRegistry::new(session);
    let int = registry.resolve(MODULE, int).unwrap();
    let point = registry.resolve(MODULE, point).unwrap();

    assert!(matches!(
        registry.read_primitive(&int, &ValueLocation::Memory(Address::new(0xdead_0000)), None),
        Err(TypeError::MemoryRead { .. })
    ));
    assert!(matches!(
        registry.read_primitive(&int, &ValueLocation::Bytes(vec![1, 2]), None),
        Err(TypeError::InvalidArgument(_))
    ));
    assert!(matches!(
        registry.read_primitive(&point, &ValueLocation::Bytes(vec![0; 8]), None),
        Err(TypeError::InvalidArgument(_))
    ));
}

#[test]
fn test_unexpected_base_type_surfaces_from_read()
{
    let mut session = MemorySession::new(TargetWidth::Bits64);
    let half = session.add_base_type(MODULE, BasicType::Float, 2);

    let registry = TypeRegistry::new(session);
    let node = registry.resolve(MODULE, half).unwrap();

    assert!(matches!(
        registry.read_primitive(&node, &ValueLocation::Bytes(vec![0, 0]), None),
        Err(TypeError::UnexpectedBasicType { .. })
    ));
}
