//! In-memory session backed by records the host registers up front.
//!
//! Hosts that already own decoded type records (a PDB reader, a remote
//! engine proxy, a test fixture) describe them through the `add_*` builder
//! methods. Ids are allocated per module, starting at 1, in insertion order.
//!
//! ## Usage
//!
//! ```rust
//! use ferrotype_core::session::{MemorySession, UdtKind};
//! use ferrotype_core::types::{ModuleBase, TargetWidth};
//! use ferrotype_core::value::BasicType;
//!
//! let module = ModuleBase(0x1000_0000);
//! let mut session = MemorySession::new(TargetWidth::Bits64);
//! let int = session.add_base_type(module, BasicType::Int, 4);
//! let point = session.add_udt(module, "Point", UdtKind::Struct, 8);
//! session.add_member(module, point, "x", int, 0);
//! session.add_member(module, point, "y", int, 4);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::records::{
    ArrayTypeInfo, BaseClassInfo, BaseTypeInfo, CallingConvention, DataInfo, DataKind, EnumInfo, FuncArgTypeInfo,
    FuncInfo, FuncTypeInfo, GeneratedTypeInfo, PointerTypeInfo, SymTag, TypedefInfo, UdtInfo, UdtKind, VTableInfo,
    VTableShapeInfo,
};
use super::DebuggerSession;
use crate::error::{TypeError, TypeResult};
use crate::types::{Address, ModuleBase, TargetWidth, TypeId, TypeKey};
use crate::value::{BasicType, Bitfield, PrimitiveValue};

#[derive(Debug, Clone)]
pub(super) enum Record
{
    Null,
    Base(BaseTypeInfo),
    Array(ArrayTypeInfo),
    Pointer(PointerTypeInfo),
    Udt(UdtInfo),
    BaseClass(BaseClassInfo),
    Enum(EnumInfo),
    Data(DataInfo),
    Func(FuncInfo),
    FuncType(FuncTypeInfo),
    FuncArg(FuncArgTypeInfo),
    VTable(VTableInfo),
    VTableShape(VTableShapeInfo),
    Typedef(TypedefInfo),
    Generated(GeneratedTypeInfo),
    Opaque(SymTag),
}

impl Record
{
    fn tag(&self) -> SymTag
    {
        match self {
            Record::Null | Record::Generated(_) => SymTag::Null,
            Record::Base(_) => SymTag::BaseType,
            Record::Array(_) => SymTag::ArrayType,
            Record::Pointer(_) => SymTag::PointerType,
            Record::Udt(_) => SymTag::Udt,
            Record::BaseClass(_) => SymTag::BaseClass,
            Record::Enum(_) => SymTag::Enum,
            Record::Data(_) => SymTag::Data,
            Record::Func(_) => SymTag::Function,
            Record::FuncType(_) => SymTag::FunctionType,
            Record::FuncArg(_) => SymTag::FunctionArgType,
            Record::VTable(_) => SymTag::VTable,
            Record::VTableShape(_) => SymTag::VTableShape,
            Record::Typedef(_) => SymTag::Typedef,
            Record::Opaque(tag) => *tag,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry
{
    record: Record,
    children: Vec<TypeId>,
}

/// Session over host-registered records
#[derive(Debug)]
pub struct MemorySession
{
    width: TargetWidth,
    entries: HashMap<TypeKey, Entry>,
    next_ids: HashMap<ModuleBase, u32>,
    memory: Vec<(Address, Vec<u8>)>,
    registers: HashMap<u32, Vec<u8>>,
    children_queries: AtomicUsize,
    record_queries: AtomicUsize,
}

impl MemorySession
{
    /// Create an empty session for a target of the given width.
    #[must_use]
    pub fn new(width: TargetWidth) -> Self
    {
        Self {
            width,
            entries: HashMap::new(),
            next_ids: HashMap::new(),
            memory: Vec::new(),
            registers: HashMap::new(),
            children_queries: AtomicUsize::new(0),
            record_queries: AtomicUsize::new(0),
        }
    }

    /// Number of `children_ids` calls served so far.
    pub fn children_queries(&self) -> usize
    {
        self.children_queries.load(Ordering::Relaxed)
    }

    /// Number of record (`*_info`) calls served so far.
    pub fn record_queries(&self) -> usize
    {
        self.record_queries.load(Ordering::Relaxed)
    }

    fn insert(&mut self, module: ModuleBase, record: Record) -> TypeId
    {
        let next = self.next_ids.entry(module).or_insert(1);
        let id = TypeId(*next);
        *next += 1;
        self.entries.insert(
            TypeKey::new(module, id),
            Entry {
                record,
                children: Vec::new(),
            },
        );
        id
    }

    fn push_child(&mut self, module: ModuleBase, parent: TypeId, child: TypeId)
    {
        if let Some(entry) = self.entries.get_mut(&TypeKey::new(module, parent)) {
            entry.children.push(child);
        }
    }

    /// Allocate an id whose record is filled in later with [`Self::define`].
    pub(super) fn reserve(&mut self, module: ModuleBase) -> TypeId
    {
        self.insert(module, Record::Null)
    }

    pub(super) fn define(&mut self, module: ModuleBase, type_id: TypeId, record: Record)
    {
        if let Some(entry) = self.entries.get_mut(&TypeKey::new(module, type_id)) {
            entry.record = record;
        }
    }

    pub(super) fn attach(&mut self, module: ModuleBase, parent: TypeId, child: TypeId)
    {
        self.push_child(module, parent, child);
    }

    pub(super) fn record_mut(&mut self, module: ModuleBase, type_id: TypeId) -> Option<&mut Record>
    {
        self.entries
            .get_mut(&TypeKey::new(module, type_id))
            .map(|entry| &mut entry.record)
    }

    pub(super) fn insert_record(&mut self, module: ModuleBase, record: Record) -> TypeId
    {
        self.insert(module, record)
    }

    /// Register a `SymTagNull` record.
    pub fn add_null(&mut self, module: ModuleBase) -> TypeId
    {
        self.insert(module, Record::Null)
    }

    /// Register a record whose tag the model has no node for (friends, thunks...).
    pub fn add_opaque(&mut self, module: ModuleBase, tag: SymTag) -> TypeId
    {
        self.insert(module, Record::Opaque(tag))
    }

    /// Register a debugger-synthesized id with no symbol record behind it.
    pub fn add_generated(&mut self, module: ModuleBase, name: &str, size: u64) -> TypeId
    {
        self.insert(
            module,
            Record::Generated(GeneratedTypeInfo {
                name: name.to_string(),
                size,
            }),
        )
    }

    pub fn add_base_type(&mut self, module: ModuleBase, basic_type: BasicType, size: u64) -> TypeId
    {
        self.insert(
            module,
            Record::Base(BaseTypeInfo {
                basic_type,
                size,
                name: None,
            }),
        )
    }

    /// Register a pointer sized for the target.
    pub fn add_pointer(&mut self, module: ModuleBase, pointee: TypeId) -> TypeId
    {
        let size = self.width.pointer_size_bytes();
        self.insert(
            module,
            Record::Pointer(PointerTypeInfo {
                pointee_type_id: pointee,
                size,
                is_reference: false,
            }),
        )
    }

    pub fn add_reference(&mut self, module: ModuleBase, pointee: TypeId) -> TypeId
    {
        let size = self.width.pointer_size_bytes();
        self.insert(
            module,
            Record::Pointer(PointerTypeInfo {
                pointee_type_id: pointee,
                size,
                is_reference: true,
            }),
        )
    }

    /// Register an array; `size` is the declared total size.
    pub fn add_array(&mut self, module: ModuleBase, element: TypeId, count: u64, size: u64) -> TypeId
    {
        self.insert(
            module,
            Record::Array(ArrayTypeInfo {
                element_type_id: element,
                count,
                size,
            }),
        )
    }

    pub fn add_udt(&mut self, module: ModuleBase, name: &str, kind: UdtKind, size: u64) -> TypeId
    {
        self.insert(
            module,
            Record::Udt(UdtInfo {
                name: name.to_string(),
                size,
                kind,
                class_parent_id: None,
                vtable_shape_id: None,
                child_count: 0,
            }),
        )
    }

    fn add_data(&mut self, module: ModuleBase, parent: Option<TypeId>, info: DataInfo) -> TypeId
    {
        let id = self.insert(module, Record::Data(info));
        if let Some(parent) = parent {
            self.push_child(module, parent, id);
        }
        id
    }

    /// Add a data member at `offset` to `udt`.
    pub fn add_member(&mut self, module: ModuleBase, udt: TypeId, name: &str, type_id: TypeId, offset: u64) -> TypeId
    {
        self.add_data(
            module,
            Some(udt),
            DataInfo {
                name: name.to_string(),
                type_id,
                kind: DataKind::Member,
                offset,
                bitfield: None,
                address: None,
                value: None,
                class_parent_id: Some(udt),
            },
        )
    }

    /// Add a bitfield data member to `udt`.
    pub fn add_bitfield_member(
        &mut self,
        module: ModuleBase,
        udt: TypeId,
        name: &str,
        type_id: TypeId,
        offset: u64,
        bitfield: Bitfield,
    ) -> TypeId
    {
        self.add_data(
            module,
            Some(udt),
            DataInfo {
                name: name.to_string(),
                type_id,
                kind: DataKind::Member,
                offset,
                bitfield: Some(bitfield),
                address: None,
                value: None,
                class_parent_id: Some(udt),
            },
        )
    }

    pub fn add_static_member(
        &mut self,
        module: ModuleBase,
        udt: TypeId,
        name: &str,
        type_id: TypeId,
        address: Address,
    ) -> TypeId
    {
        self.add_data(
            module,
            Some(udt),
            DataInfo {
                name: name.to_string(),
                type_id,
                kind: DataKind::StaticMember,
                offset: 0,
                bitfield: None,
                address: Some(address),
                value: None,
                class_parent_id: Some(udt),
            },
        )
    }

    /// Register a constant-valued symbol, optionally as a child of `parent`.
    pub fn add_constant(
        &mut self,
        module: ModuleBase,
        parent: Option<TypeId>,
        name: &str,
        type_id: TypeId,
        value: PrimitiveValue,
    ) -> TypeId
    {
        self.add_data(
            module,
            parent,
            DataInfo {
                name: name.to_string(),
                type_id,
                kind: DataKind::Constant,
                offset: 0,
                bitfield: None,
                address: None,
                value: Some(value),
                class_parent_id: parent,
            },
        )
    }

    /// Register a global variable (not attached to any type).
    pub fn add_global(&mut self, module: ModuleBase, name: &str, type_id: TypeId, address: Address) -> TypeId
    {
        self.add_data(
            module,
            None,
            DataInfo {
                name: name.to_string(),
                type_id,
                kind: DataKind::Global,
                offset: 0,
                bitfield: None,
                address: Some(address),
                value: None,
                class_parent_id: None,
            },
        )
    }

    /// Add a non-virtual base class at `offset` to `udt`.
    pub fn add_base_class(&mut self, module: ModuleBase, udt: TypeId, base: TypeId, offset: u64) -> TypeId
    {
        let id = self.insert(
            module,
            Record::BaseClass(BaseClassInfo {
                base_class_type_id: base,
                is_virtual: false,
                is_indirect_virtual: false,
                offset,
                virtual_base_disp_index: 0,
                virtual_base_pointer_offset: 0,
            }),
        );
        self.push_child(module, udt, id);
        id
    }

    /// Add a virtual base class to `udt`.
    pub fn add_virtual_base_class(
        &mut self,
        module: ModuleBase,
        udt: TypeId,
        base: TypeId,
        disp_index: u32,
        pointer_offset: i64,
        indirect: bool,
    ) -> TypeId
    {
        let id = self.insert(
            module,
            Record::BaseClass(BaseClassInfo {
                base_class_type_id: base,
                is_virtual: true,
                is_indirect_virtual: indirect,
                offset: 0,
                virtual_base_disp_index: disp_index,
                virtual_base_pointer_offset: pointer_offset,
            }),
        );
        self.push_child(module, udt, id);
        id
    }

    /// Give `udt` its own vtable with `slot_count` slots at `offset`.
    ///
    /// Returns the vtable id; the shape is registered alongside it.
    pub fn add_vtable(&mut self, module: ModuleBase, udt: TypeId, slot_count: u32, offset: u64) -> TypeId
    {
        let shape = self.insert(module, Record::VTableShape(VTableShapeInfo { slot_count }));
        let id = self.insert(
            module,
            Record::VTable(VTableInfo {
                owning_class_id: udt,
                vtable_shape_id: shape,
                offset,
            }),
        );
        if let Some(Entry {
            record: Record::Udt(info),
            ..
        }) = self.entries.get_mut(&TypeKey::new(module, udt))
        {
            info.vtable_shape_id = Some(shape);
        }
        self.push_child(module, udt, id);
        id
    }

    pub fn add_enum(&mut self, module: ModuleBase, name: &str, base_type: TypeId, size: u64) -> TypeId
    {
        self.insert(
            module,
            Record::Enum(EnumInfo {
                name: name.to_string(),
                base_type_id: base_type,
                size,
                class_parent_id: None,
                child_count: 0,
            }),
        )
    }

    /// Add an enumerand to `enum_id`; its type is the enum's base type.
    pub fn add_enumerand(&mut self, module: ModuleBase, enum_id: TypeId, name: &str, value: PrimitiveValue) -> TypeId
    {
        let base = match self.entries.get(&TypeKey::new(module, enum_id)).map(|entry| &entry.record) {
            Some(Record::Enum(info)) => info.base_type_id,
            _ => enum_id,
        };
        self.add_constant(module, Some(enum_id), name, base, value)
    }

    pub fn add_typedef(&mut self, module: ModuleBase, name: &str, represented: TypeId) -> TypeId
    {
        self.insert(
            module,
            Record::Typedef(TypedefInfo {
                name: name.to_string(),
                represented_type_id: represented,
            }),
        )
    }

    /// Attach an already-registered record as a child of `parent`.
    ///
    /// Nested UDTs and enums get `parent` as their class parent.
    pub fn add_child(&mut self, module: ModuleBase, parent: TypeId, child: TypeId)
    {
        if let Some(entry) = self.entries.get_mut(&TypeKey::new(module, child)) {
            match &mut entry.record {
                Record::Udt(info) => info.class_parent_id = Some(parent),
                Record::Enum(info) => info.class_parent_id = Some(parent),
                _ => {}
            }
        }
        self.push_child(module, parent, child);
    }

    /// Register a function type; each argument gets a `FunctionArgType` child.
    pub fn add_function_type(
        &mut self,
        module: ModuleBase,
        return_type: TypeId,
        args: &[TypeId],
        calling_convention: CallingConvention,
        class_parent: Option<TypeId>,
    ) -> TypeId
    {
        let id = self.insert(
            module,
            Record::FuncType(FuncTypeInfo {
                return_type_id: return_type,
                arg_count: 0,
                calling_convention,
                class_parent_id: class_parent,
                this_adjust: 0,
            }),
        );
        for arg in args {
            let arg_id = self.insert(module, Record::FuncArg(FuncArgTypeInfo { arg_type_id: *arg }));
            self.push_child(module, id, arg_id);
        }
        id
    }

    /// Register a function, as a member of `owner` when given.
    pub fn add_function(
        &mut self,
        module: ModuleBase,
        owner: Option<TypeId>,
        name: &str,
        function_type: TypeId,
        address: Option<Address>,
    ) -> TypeId
    {
        let id = self.insert(
            module,
            Record::Func(FuncInfo {
                name: name.to_string(),
                function_type_id: function_type,
                address,
                length: 0,
                class_parent_id: owner,
            }),
        );
        if let Some(owner) = owner {
            self.push_child(module, owner, id);
        }
        id
    }

    /// Back `address..address + bytes.len()` with the given bytes.
    pub fn write_memory(&mut self, address: Address, bytes: &[u8])
    {
        self.memory.push((address, bytes.to_vec()));
    }

    pub fn set_register(&mut self, register: u32, bytes: &[u8])
    {
        self.registers.insert(register, bytes.to_vec());
    }

    fn entry(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<&Entry>
    {
        self.record_queries.fetch_add(1, Ordering::Relaxed);
        self.entries
            .get(&TypeKey::new(module, type_id))
            .ok_or_else(|| TypeError::not_found(module, type_id))
    }

    fn mismatch(type_id: TypeId, wanted: &str, found: &Record) -> TypeError
    {
        TypeError::InvalidArgument(format!("id {type_id} is a {} record, not {wanted}", found.tag()))
    }
}

macro_rules! record_accessor {
    ($method:ident, $variant:ident, $info:ty, $label:literal) => {
        fn $method(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<$info>
        {
            let entry = self.entry(module, type_id)?;
            match &entry.record {
                Record::$variant(info) => Ok(info.clone()),
                other => Err(Self::mismatch(type_id, $label, other)),
            }
        }
    };
}

impl DebuggerSession for MemorySession
{
    record_accessor!(base_type_info, Base, BaseTypeInfo, "a base type");

    record_accessor!(array_type_info, Array, ArrayTypeInfo, "an array");

    record_accessor!(pointer_type_info, Pointer, PointerTypeInfo, "a pointer");

    record_accessor!(base_class_info, BaseClass, BaseClassInfo, "a base class");

    record_accessor!(data_info, Data, DataInfo, "data");

    record_accessor!(func_info, Func, FuncInfo, "a function");

    record_accessor!(func_arg_type_info, FuncArg, FuncArgTypeInfo, "a function argument");

    record_accessor!(vtable_info, VTable, VTableInfo, "a vtable");

    record_accessor!(vtable_shape_info, VTableShape, VTableShapeInfo, "a vtable shape");

    record_accessor!(typedef_info, Typedef, TypedefInfo, "a typedef");

    fn sym_tag(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<SymTag>
    {
        Ok(self.entry(module, type_id)?.record.tag())
    }

    fn generated_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<Option<GeneratedTypeInfo>>
    {
        match &self.entry(module, type_id)?.record {
            Record::Generated(info) => Ok(Some(info.clone())),
            _ => Ok(None),
        }
    }

    fn udt_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<UdtInfo>
    {
        let entry = self.entry(module, type_id)?;
        match &entry.record {
            Record::Udt(info) => Ok(UdtInfo {
                child_count: u32::try_from(entry.children.len()).unwrap_or(u32::MAX),
                ..info.clone()
            }),
            other => Err(Self::mismatch(type_id, "a UDT", other)),
        }
    }

    fn enum_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<EnumInfo>
    {
        let entry = self.entry(module, type_id)?;
        match &entry.record {
            Record::Enum(info) => Ok(EnumInfo {
                child_count: u32::try_from(entry.children.len()).unwrap_or(u32::MAX),
                ..info.clone()
            }),
            other => Err(Self::mismatch(type_id, "an enum", other)),
        }
    }

    fn func_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<FuncTypeInfo>
    {
        let entry = self.entry(module, type_id)?;
        match &entry.record {
            Record::FuncType(info) => Ok(FuncTypeInfo {
                arg_count: u32::try_from(entry.children.len()).unwrap_or(u32::MAX),
                ..info.clone()
            }),
            other => Err(Self::mismatch(type_id, "a function type", other)),
        }
    }

    fn children_ids(&self, module: ModuleBase, parent: TypeId, count: u32) -> TypeResult<Vec<TypeId>>
    {
        self.children_queries.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .entries
            .get(&TypeKey::new(module, parent))
            .ok_or_else(|| TypeError::not_found(module, parent))?;
        if entry.children.len() != count as usize {
            tracing::debug!(%parent, expected = count, actual = entry.children.len(), "child count changed");
        }
        Ok(entry.children.clone())
    }

    fn target_width(&self) -> TargetWidth
    {
        self.width
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> TypeResult<()>
    {
        let len = buf.len() as u64;
        for (start, bytes) in &self.memory {
            let Some(skip) = address.offset_from(*start) else {
                continue;
            };
            if skip.checked_add(len).is_some_and(|end| end <= bytes.len() as u64) {
                let skip = usize::try_from(skip).unwrap_or(usize::MAX);
                buf.copy_from_slice(&bytes[skip..skip + buf.len()]);
                return Ok(());
            }
        }
        Err(TypeError::MemoryRead {
            address,
            details: format!("{len} bytes are not backed by any region"),
        })
    }

    fn read_register(&self, register: u32, buf: &mut [u8]) -> TypeResult<()>
    {
        let bytes = self
            .registers
            .get(&register)
            .ok_or_else(|| TypeError::Unsupported(format!("register {register} has no value")))?;
        if bytes.len() < buf.len() {
            return Err(TypeError::InvalidArgument(format!(
                "register {register} holds {} bytes, {} requested",
                bytes.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&bytes[..buf.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_read_inside_region()
    {
        let mut session = MemorySession::new(TargetWidth::Bits64);
        session.write_memory(Address::new(0x1000), &[1, 2, 3, 4]);

        let mut buf = [0u8; 2];
        session.read_memory(Address::new(0x1002), &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn test_read_near_top_of_address_space_is_unbacked()
    {
        let mut session = MemorySession::new(TargetWidth::Bits64);
        session.write_memory(Address::new(0), &[0; 16]);

        let mut buf = [0u8; 8];
        let err = session.read_memory(Address::new(u64::MAX - 1), &mut buf).unwrap_err();
        assert!(matches!(err, TypeError::MemoryRead { .. }));
    }
}
