//! DWARF-backed debugger session.
//!
//! Loads a binary with `object`, parses its DWARF with `gimli` and decodes
//! every type-describing DIE into raw records up front. Node construction in
//! the registry stays lazy; only the flat record table is built eagerly.
//!
//! ## Mapping
//!
//! | DWARF                                   | Record                          |
//! |-----------------------------------------|---------------------------------|
//! | `DW_TAG_base_type`                      | `BaseType`                      |
//! | `DW_TAG_pointer_type`, reference types  | `PointerType`                   |
//! | `DW_TAG_array_type`                     | `ArrayType`, one per dimension  |
//! | structure, class, union                 | `Udt`                           |
//! | `DW_TAG_enumeration_type`/`enumerator`  | `Enum` / constant `Data`        |
//! | `DW_TAG_typedef`                        | `Typedef`                       |
//! | `DW_TAG_subroutine_type`                | `FunctionType`                  |
//! | `DW_TAG_subprogram`                     | `Function` + `FunctionType`     |
//! | `DW_TAG_inheritance`                    | `BaseClass`                     |
//! | `DW_TAG_member`, `DW_TAG_variable`      | `Data`                          |
//! | artificial `_vptr` member               | `VTable` + `VTableShape`        |
//!
//! `const`, `volatile`, `restrict` and `_Atomic` wrappers are transparent: a
//! reference to one resolves to the type it wraps. A missing `DW_AT_type`
//! means `void`, reported as a generated type.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gimli::constants::{self, DwAt, DwAte, DwOp, DwTag};
use gimli::{
    AttributeValue, DebuggingInformationEntry, Dwarf, EndianArcSlice, Reader, RunTimeEndian, SectionId, Unit,
    UnitOffset, UnitSectionOffset, UnitType,
};
use object::{Object, ObjectSection, SectionKind};
use smallvec::SmallVec;

use super::memory::{MemorySession, Record};
use super::records::{
    ArrayTypeInfo, BaseClassInfo, BaseTypeInfo, CallingConvention, DataInfo, DataKind, EnumInfo, FuncArgTypeInfo,
    FuncInfo, FuncTypeInfo, GeneratedTypeInfo, PointerTypeInfo, SymTag, TypedefInfo, UdtInfo, UdtKind, VTableInfo,
    VTableShapeInfo,
};
use super::DebuggerSession;
use crate::error::{TypeError, TypeResult};
use crate::template::Template;
use crate::types::{Address, ModuleBase, TargetWidth, TypeId};
use crate::value::{BasicType, Bitfield, PrimitiveValue};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

const MAX_TYPE_REF_DEPTH: usize = 32;

/// `.bss`-style sections larger than this are not backed with zeros.
const MAX_ZERO_FILL: u64 = 64 * 1024 * 1024;

const UNNAMED_TAG: &str = "<unnamed-tag>";

/// Options for [`DwarfSession::load`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DwarfSessionOptions
{
    /// Runtime base address of the image; also used as the module base.
    pub load_address: u64,
}

#[derive(Debug, Clone)]
struct NamedType
{
    name: String,
    type_id: TypeId,
    definition: bool,
}

/// Session over the DWARF of one binary image
#[derive(Debug)]
pub struct DwarfSession
{
    path: PathBuf,
    module: ModuleBase,
    records: MemorySession,
    names: Vec<NamedType>,
}

impl DwarfSession
{
    /// Load and index a binary.
    ///
    /// ## Errors
    ///
    /// - `Io`: the file could not be read
    /// - `Dwarf`: the object file or its debug sections could not be parsed
    pub fn load(path: impl AsRef<Path>, options: DwarfSessionOptions) -> TypeResult<Self>
    {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path)?;
        let file = object::File::parse(&*bytes)
            .map_err(|err| TypeError::Dwarf(format!("failed to parse {}: {err}", path.display())))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let width = if file.is_64() {
            TargetWidth::Bits64
        } else {
            TargetWidth::Bits32
        };

        let mut sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            sections.insert(*canonical, load_section_bytes(&file, aliases)?);
        }
        let dwarf = Dwarf::load(|section| Ok::<_, gimli::Error>(section_reader(&sections, section, endian)))
            .map_err(|err| map_dwarf_error("loading DWARF sections", err))?;

        let module = ModuleBase(options.load_address);
        let image_base = file.relative_address_base();
        let relocate = move |vmaddr: u64| options.load_address.wrapping_add(vmaddr.wrapping_sub(image_base));

        let units = load_units(&dwarf)?;
        let mut indexer = Indexer::new(&dwarf, &units, module, width, relocate);
        indexer.run()?;
        let Indexer { mut records, names, .. } = indexer;

        map_file_sections(&file, &mut records, relocate)?;

        tracing::debug!(path = %path.display(), %module, types = names.len(), "indexed DWARF types");
        Ok(Self {
            path,
            module,
            records,
            names,
        })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Module base every id of this session is keyed under.
    pub fn module(&self) -> ModuleBase
    {
        self.module
    }

    /// Qualified names of every named type in the image.
    pub fn type_names(&self) -> impl Iterator<Item = &str> + '_
    {
        self.names.iter().map(|named| named.name.as_str())
    }

    /// Ids of the types whose qualified name matches `pattern`.
    ///
    /// Matching is case-insensitive and understands template wildcards
    /// (`std::vector<?>`). Forward declarations are only returned when no
    /// definition matches.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the pattern misplaces a `?*` wildcard.
    pub fn find_types(&self, pattern: &str) -> TypeResult<Vec<TypeId>>
    {
        let template = Template::new(pattern)?;
        let matching: Vec<&NamedType> = self
            .names
            .iter()
            .filter(|named| template.matches(&named.name))
            .collect();
        let definitions: Vec<TypeId> = matching
            .iter()
            .filter(|named| named.definition)
            .map(|named| named.type_id)
            .collect();
        if definitions.is_empty() {
            return Ok(matching.iter().map(|named| named.type_id).collect());
        }
        Ok(definitions)
    }
}

macro_rules! delegate_records {
    ($($method:ident -> $info:ty),* $(,)?) => {
        $(
            fn $method(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<$info>
            {
                self.records.$method(module, type_id)
            }
        )*
    };
}

impl DebuggerSession for DwarfSession
{
    delegate_records! {
        sym_tag -> SymTag,
        generated_type_info -> Option<GeneratedTypeInfo>,
        base_type_info -> BaseTypeInfo,
        array_type_info -> ArrayTypeInfo,
        pointer_type_info -> PointerTypeInfo,
        udt_info -> UdtInfo,
        base_class_info -> BaseClassInfo,
        enum_info -> EnumInfo,
        data_info -> DataInfo,
        func_info -> FuncInfo,
        func_type_info -> FuncTypeInfo,
        func_arg_type_info -> FuncArgTypeInfo,
        vtable_info -> VTableInfo,
        vtable_shape_info -> VTableShapeInfo,
        typedef_info -> TypedefInfo,
    }

    fn children_ids(&self, module: ModuleBase, parent: TypeId, count: u32) -> TypeResult<Vec<TypeId>>
    {
        self.records.children_ids(module, parent, count)
    }

    fn target_width(&self) -> TargetWidth
    {
        self.records.target_width()
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> TypeResult<()>
    {
        self.records.read_memory(address, buf)
    }
}

/// Location of a DIE: unit index plus offset within that unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DieKey(usize, usize);

#[derive(Debug, Clone, Copy)]
enum Slot
{
    Record(TypeId),
    /// cv-qualifier wrapping another DIE (`None` wraps `void`)
    Alias(Option<DieKey>),
}

#[derive(Debug, Clone, Copy)]
struct Parent
{
    id: TypeId,
    key: DieKey,
    tag: DwTag,
}

#[derive(Debug, Clone)]
struct Pending
{
    key: DieKey,
    id: TypeId,
    parent: Option<Parent>,
    name: Option<String>,
}

#[derive(Debug, Clone)]
struct Scope
{
    depth: isize,
    segment: Option<String>,
    parent: Option<Parent>,
    /// Children are not type descriptions (function bodies, template packs...)
    opaque: bool,
}

struct Indexer<'a, F>
{
    dwarf: &'a OwnedDwarf,
    units: &'a [Unit<OwnedReader>],
    module: ModuleBase,
    width: TargetWidth,
    relocate: F,
    records: MemorySession,
    slots: HashMap<DieKey, Slot>,
    signatures: HashMap<u64, DieKey>,
    pending: Vec<Pending>,
    static_definitions: Vec<(DieKey, Address)>,
    names: Vec<NamedType>,
    void: Option<TypeId>,
}

fn is_udt_tag(tag: DwTag) -> bool
{
    matches!(
        tag,
        constants::DW_TAG_structure_type
            | constants::DW_TAG_class_type
            | constants::DW_TAG_union_type
            | constants::DW_TAG_interface_type
    )
}

impl<'a, F> Indexer<'a, F>
where
    F: Fn(u64) -> u64,
{
    fn new(
        dwarf: &'a OwnedDwarf,
        units: &'a [Unit<OwnedReader>],
        module: ModuleBase,
        width: TargetWidth,
        relocate: F,
    ) -> Self
    {
        let mut signatures = HashMap::new();
        for (index, unit) in units.iter().enumerate() {
            match unit.header.type_() {
                UnitType::Type {
                    type_signature,
                    type_offset,
                }
                | UnitType::SplitType {
                    type_signature,
                    type_offset,
                } => {
                    signatures.insert(type_signature.0, DieKey(index, type_offset.0));
                }
                _ => {}
            }
        }

        Self {
            dwarf,
            units,
            module,
            width,
            relocate,
            records: MemorySession::new(width),
            slots: HashMap::new(),
            signatures,
            pending: Vec::new(),
            static_definitions: Vec::new(),
            names: Vec::new(),
            void: None,
        }
    }

    fn run(&mut self) -> TypeResult<()>
    {
        for index in 0..self.units.len() {
            self.scan_unit(index)?;
        }
        let pending = std::mem::take(&mut self.pending);
        for item in &pending {
            self.define(item)?;
        }
        for (declaration, address) in std::mem::take(&mut self.static_definitions) {
            if let Some(Slot::Record(id)) = self.slots.get(&declaration) {
                if let Some(Record::Data(info)) = self.records.record_mut(self.module, *id) {
                    info.address = Some(address);
                }
            }
        }
        Ok(())
    }

    /// First pass: assign ids in DFS order and remember what each id is.
    fn scan_unit(&mut self, index: usize) -> TypeResult<()>
    {
        let units = self.units;
        let unit = &units[index];
        let mut cursor = unit.entries();
        let mut depth: isize = 0;
        let mut scopes: SmallVec<[Scope; 8]> = SmallVec::new();
        let mut assigned = Vec::new();
        let mut aliases = Vec::new();
        let mut statics = Vec::new();

        while let Some((delta, entry)) = cursor.next_dfs().map_err(|err| map_dwarf_error("traversing DIE tree", err))? {
            depth += delta;
            while scopes.last().is_some_and(|scope| scope.depth >= depth) {
                scopes.pop();
            }
            if scopes.iter().any(|scope| scope.opaque) {
                continue;
            }

            let key = DieKey(index, entry.offset().0);
            let tag = entry.tag();
            let enclosing = scopes.last().and_then(|scope| scope.parent);
            let name = entry_name(self.dwarf, unit, entry)?;
            let qualified = name.as_deref().map(|name| qualify(&scopes, name));

            let mut scope = Scope {
                depth,
                segment: None,
                parent: None,
                opaque: true,
            };

            match tag {
                constants::DW_TAG_compile_unit | constants::DW_TAG_type_unit | constants::DW_TAG_partial_unit => {
                    scope.opaque = false;
                }
                constants::DW_TAG_namespace => {
                    scope.segment = Some(name.unwrap_or_else(|| "(anonymous namespace)".to_string()));
                    scope.opaque = false;
                }
                constants::DW_TAG_const_type
                | constants::DW_TAG_volatile_type
                | constants::DW_TAG_restrict_type
                | constants::DW_TAG_atomic_type => {
                    aliases.push((key, type_ref(units, &self.signatures, index, entry)?));
                }
                constants::DW_TAG_base_type
                | constants::DW_TAG_pointer_type
                | constants::DW_TAG_reference_type
                | constants::DW_TAG_rvalue_reference_type
                | constants::DW_TAG_ptr_to_member_type
                | constants::DW_TAG_array_type
                | constants::DW_TAG_typedef
                | constants::DW_TAG_unspecified_type
                | constants::DW_TAG_subroutine_type => {
                    let parent = if tag == constants::DW_TAG_typedef {
                        enclosing.filter(|parent| is_udt_tag(parent.tag))
                    } else {
                        None
                    };
                    assigned.push((key, parent, qualified));
                }
                constants::DW_TAG_structure_type
                | constants::DW_TAG_class_type
                | constants::DW_TAG_union_type
                | constants::DW_TAG_interface_type
                | constants::DW_TAG_enumeration_type => {
                    let id = self.records.reserve(self.module);
                    scope.segment = Some(name.unwrap_or_else(|| UNNAMED_TAG.to_string()));
                    scope.parent = Some(Parent { id, key, tag });
                    scope.opaque = false;
                    self.slots.insert(key, Slot::Record(id));
                    self.pending.push(Pending {
                        key,
                        id,
                        parent: enclosing.filter(|parent| is_udt_tag(parent.tag)),
                        name: qualified,
                    });
                }
                constants::DW_TAG_member | constants::DW_TAG_inheritance => {
                    if enclosing.is_some_and(|parent| is_udt_tag(parent.tag)) {
                        assigned.push((key, enclosing, name));
                    }
                }
                constants::DW_TAG_enumerator => {
                    if enclosing.is_some_and(|parent| parent.tag == constants::DW_TAG_enumeration_type) {
                        assigned.push((key, enclosing, name));
                    }
                }
                constants::DW_TAG_subprogram => {
                    let out_of_line = entry
                        .attr(constants::DW_AT_specification)
                        .map_err(|err| map_dwarf_error("reading DW_AT_specification", err))?
                        .is_some()
                        || entry
                            .attr(constants::DW_AT_abstract_origin)
                            .map_err(|err| map_dwarf_error("reading DW_AT_abstract_origin", err))?
                            .is_some();
                    if !out_of_line {
                        match enclosing.filter(|parent| is_udt_tag(parent.tag)) {
                            Some(parent) => assigned.push((key, Some(parent), name)),
                            None => assigned.push((key, None, qualified)),
                        }
                    }
                }
                constants::DW_TAG_variable => {
                    if enclosing.is_some_and(|parent| is_udt_tag(parent.tag)) {
                        assigned.push((key, enclosing, name));
                    } else if let Some(address) = variable_address(unit, entry)? {
                        let address = Address::new((self.relocate)(address));
                        match entry
                            .attr(constants::DW_AT_specification)
                            .map_err(|err| map_dwarf_error("reading DW_AT_specification", err))?
                        {
                            Some(attr) => {
                                if let Some(declaration) = die_ref(units, &self.signatures, index, attr.value()) {
                                    statics.push((declaration, address));
                                }
                            }
                            None => assigned.push((key, None, qualified)),
                        }
                    }
                }
                _ => {}
            }

            if entry.has_children() {
                scopes.push(scope);
            }

            for (key, parent, name) in assigned.drain(..) {
                let id = self.records.reserve(self.module);
                self.slots.insert(key, Slot::Record(id));
                self.pending.push(Pending { key, id, parent, name });
            }
        }

        for (key, target) in aliases {
            self.slots.insert(key, Slot::Alias(target));
        }
        self.static_definitions.extend(statics);
        Ok(())
    }

    fn void_id(&mut self) -> TypeId
    {
        if let Some(id) = self.void {
            return id;
        }
        let id = self.records.add_generated(self.module, "void", 0);
        self.void = Some(id);
        id
    }

    /// Map a DIE reference to the id it stands for, looking through cv-qualifiers.
    fn resolve(&mut self, key: Option<DieKey>) -> TypeId
    {
        let mut current = key;
        for _ in 0..MAX_TYPE_REF_DEPTH {
            let Some(die) = current else {
                return self.void_id();
            };
            match self.slots.get(&die) {
                Some(Slot::Record(id)) => return *id,
                Some(Slot::Alias(next)) => current = *next,
                None => {
                    tracing::debug!(unit = die.0, offset = die.1, "reference to a DIE with no record");
                    return self.void_id();
                }
            }
        }
        tracing::warn!("cv-qualifier chain exceeds {MAX_TYPE_REF_DEPTH} links");
        self.void_id()
    }

    fn resolve_type_attr(&mut self, unit_index: usize, entry: &DebuggingInformationEntry<'_, '_, OwnedReader>)
        -> TypeResult<TypeId>
    {
        let target = type_ref(self.units, &self.signatures, unit_index, entry)?;
        Ok(self.resolve(target))
    }

    /// Second pass: decode one DIE into its record.
    fn define(&mut self, pending: &Pending) -> TypeResult<()>
    {
        let unit_index = pending.key.0;
        let units = self.units;
        let entry = units[unit_index]
            .entry(UnitOffset(pending.key.1))
            .map_err(|err| map_dwarf_error("re-reading DIE", err))?;
        let module = self.module;
        let name = pending.name.clone().unwrap_or_default();
        let parent_id = pending.parent.map(|parent| parent.id);
        let byte_size = udata_attr(&entry, constants::DW_AT_byte_size)?;
        let declaration = flag_attr(&entry, constants::DW_AT_declaration)?;

        let record = match entry.tag() {
            constants::DW_TAG_base_type => {
                let encoding = match entry
                    .attr(constants::DW_AT_encoding)
                    .map_err(|err| map_dwarf_error("reading DW_AT_encoding", err))?
                    .map(|attr| attr.value())
                {
                    Some(AttributeValue::Encoding(encoding)) => encoding,
                    _ => DwAte(0),
                };
                let size = byte_size.unwrap_or(0);
                self.index_name(&name, pending.id, true);
                Record::Base(BaseTypeInfo {
                    basic_type: basic_type_for(encoding, size, &name),
                    size,
                    name: pending.name.clone(),
                })
            }
            constants::DW_TAG_pointer_type
            | constants::DW_TAG_reference_type
            | constants::DW_TAG_rvalue_reference_type
            | constants::DW_TAG_ptr_to_member_type => Record::Pointer(PointerTypeInfo {
                pointee_type_id: self.resolve_type_attr(unit_index, &entry)?,
                size: byte_size.unwrap_or_else(|| self.width.pointer_size_bytes()),
                is_reference: matches!(
                    entry.tag(),
                    constants::DW_TAG_reference_type | constants::DW_TAG_rvalue_reference_type
                ),
            }),
            constants::DW_TAG_array_type => {
                let element = self.resolve_type_attr(unit_index, &entry)?;
                let dimensions = self.array_dimensions(pending.key)?;
                let mut inner = element;
                for count in dimensions.iter().skip(1).rev() {
                    inner = self.records.insert_record(
                        module,
                        Record::Array(ArrayTypeInfo {
                            element_type_id: inner,
                            count: *count,
                            size: 0,
                        }),
                    );
                }
                Record::Array(ArrayTypeInfo {
                    element_type_id: inner,
                    count: dimensions.first().copied().unwrap_or(0),
                    size: byte_size.unwrap_or(0),
                })
            }
            constants::DW_TAG_structure_type
            | constants::DW_TAG_class_type
            | constants::DW_TAG_union_type
            | constants::DW_TAG_interface_type => {
                let name = pending.name.clone().unwrap_or_else(|| qualify_unnamed(pending));
                self.index_name(&name, pending.id, !declaration);
                Record::Udt(UdtInfo {
                    name,
                    size: byte_size.unwrap_or(0),
                    kind: match entry.tag() {
                        constants::DW_TAG_class_type => UdtKind::Class,
                        constants::DW_TAG_union_type => UdtKind::Union,
                        constants::DW_TAG_interface_type => UdtKind::Interface,
                        _ => UdtKind::Struct,
                    },
                    class_parent_id: parent_id,
                    vtable_shape_id: None,
                    child_count: 0,
                })
            }
            constants::DW_TAG_enumeration_type => {
                let size = byte_size.unwrap_or(4);
                let base_type_id = if entry
                    .attr(constants::DW_AT_type)
                    .map_err(|err| map_dwarf_error("reading DW_AT_type", err))?
                    .is_some()
                {
                    self.resolve_type_attr(unit_index, &entry)?
                } else {
                    self.records.add_base_type(module, BasicType::Int, size)
                };
                let name = pending.name.clone().unwrap_or_else(|| qualify_unnamed(pending));
                self.index_name(&name, pending.id, !declaration);
                Record::Enum(EnumInfo {
                    name,
                    base_type_id,
                    size,
                    class_parent_id: parent_id,
                    child_count: 0,
                })
            }
            constants::DW_TAG_enumerator => {
                let enum_base = pending
                    .parent
                    .and_then(|parent| match self.records.record_mut(module, parent.id) {
                        Some(Record::Enum(info)) => Some(info.base_type_id),
                        _ => None,
                    });
                let base_type_id = match enum_base {
                    Some(id) => id,
                    None => self.void_id(),
                };
                let value = entry
                    .attr(constants::DW_AT_const_value)
                    .map_err(|err| map_dwarf_error("reading DW_AT_const_value", err))?
                    .and_then(|attr| match attr.value() {
                        AttributeValue::Sdata(value) => Some(PrimitiveValue::I64(value)),
                        _ => attr
                            .udata_value()
                            .map(PrimitiveValue::U64)
                            .or_else(|| attr.sdata_value().map(PrimitiveValue::I64)),
                    });
                Record::Data(DataInfo {
                    name,
                    type_id: base_type_id,
                    kind: DataKind::Constant,
                    offset: 0,
                    bitfield: None,
                    address: None,
                    value,
                    class_parent_id: parent_id,
                })
            }
            constants::DW_TAG_typedef => {
                self.index_name(&name, pending.id, true);
                Record::Typedef(TypedefInfo {
                    name,
                    represented_type_id: self.resolve_type_attr(unit_index, &entry)?,
                })
            }
            constants::DW_TAG_unspecified_type => {
                self.index_name(&name, pending.id, true);
                Record::Generated(GeneratedTypeInfo {
                    name,
                    size: byte_size.unwrap_or_else(|| self.width.pointer_size_bytes()),
                })
            }
            constants::DW_TAG_subroutine_type => {
                let (info, arguments) = self.function_signature(pending.key, &entry, parent_id)?;
                self.attach_arguments(pending.id, &arguments);
                Record::FuncType(info)
            }
            constants::DW_TAG_subprogram => {
                let (info, arguments) = self.function_signature(pending.key, &entry, parent_id)?;
                let function_type_id = self.records.insert_record(module, Record::FuncType(info));
                self.attach_arguments(function_type_id, &arguments);
                let address = self
                    .dwarf
                    .attr_address(
                        &units[unit_index],
                        entry
                            .attr(constants::DW_AT_low_pc)
                            .map_err(|err| map_dwarf_error("reading DW_AT_low_pc", err))?
                            .map_or(AttributeValue::Udata(0), |attr| attr.value()),
                    )
                    .map_err(|err| map_dwarf_error("resolving DW_AT_low_pc", err))?
                    .filter(|address| *address != 0)
                    .map(|address| Address::new((self.relocate)(address)));
                Record::Func(FuncInfo {
                    name,
                    function_type_id,
                    address,
                    length: udata_attr(&entry, constants::DW_AT_high_pc)?.unwrap_or(0),
                    class_parent_id: parent_id,
                })
            }
            constants::DW_TAG_inheritance => {
                let is_virtual = matches!(
                    entry
                        .attr(constants::DW_AT_virtuality)
                        .map_err(|err| map_dwarf_error("reading DW_AT_virtuality", err))?
                        .map(|attr| attr.value()),
                    Some(AttributeValue::Virtuality(virtuality)) if virtuality != constants::DW_VIRTUALITY_none
                );
                Record::BaseClass(BaseClassInfo {
                    base_class_type_id: self.resolve_type_attr(unit_index, &entry)?,
                    is_virtual,
                    is_indirect_virtual: false,
                    offset: if is_virtual {
                        0
                    } else {
                        member_location(&entry)?.unwrap_or(0)
                    },
                    virtual_base_disp_index: 0,
                    virtual_base_pointer_offset: 0,
                })
            }
            constants::DW_TAG_member if flag_attr(&entry, constants::DW_AT_artificial)? && name.starts_with("_vptr") => {
                self.vtable_record(pending, &entry)?
            }
            constants::DW_TAG_member | constants::DW_TAG_variable => {
                let type_id = self.resolve_type_attr(unit_index, &entry)?;
                let is_static = entry.tag() == constants::DW_TAG_variable
                    || flag_attr(&entry, constants::DW_AT_external)?
                    || declaration;
                if pending.parent.is_none() {
                    Record::Data(DataInfo {
                        name,
                        type_id,
                        kind: DataKind::Global,
                        offset: 0,
                        bitfield: None,
                        address: variable_address(&units[unit_index], &entry)?
                            .map(|address| Address::new((self.relocate)(address))),
                        value: None,
                        class_parent_id: None,
                    })
                } else if is_static {
                    Record::Data(DataInfo {
                        name,
                        type_id,
                        kind: DataKind::StaticMember,
                        offset: 0,
                        bitfield: None,
                        address: None,
                        value: None,
                        class_parent_id: parent_id,
                    })
                } else {
                    let (offset, bitfield) = self.member_placement(pending.key, &entry)?;
                    Record::Data(DataInfo {
                        name,
                        type_id,
                        kind: DataKind::Member,
                        offset,
                        bitfield,
                        address: None,
                        value: None,
                        class_parent_id: parent_id,
                    })
                }
            }
            other => {
                tracing::debug!(tag = %other, "DIE has no record mapping");
                return Ok(());
            }
        };

        self.records.define(module, pending.id, record);
        if let Some(parent) = pending.parent {
            self.records.attach(module, parent.id, pending.id);
        }
        Ok(())
    }

    fn index_name(&mut self, name: &str, type_id: TypeId, definition: bool)
    {
        if name.is_empty() {
            return;
        }
        self.names.push(NamedType {
            name: name.to_string(),
            type_id,
            definition,
        });
    }

    fn attach_arguments(&mut self, function_type: TypeId, arguments: &[TypeId])
    {
        for argument in arguments {
            let id = self.records.insert_record(
                self.module,
                Record::FuncArg(FuncArgTypeInfo {
                    arg_type_id: *argument,
                }),
            );
            self.records.attach(self.module, function_type, id);
        }
    }

    /// Return type and non-artificial parameter types of a subprogram or
    /// subroutine type.
    fn function_signature(
        &mut self,
        key: DieKey,
        entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
        class_parent: Option<TypeId>,
    ) -> TypeResult<(FuncTypeInfo, Vec<TypeId>)>
    {
        let return_type_id = self.resolve_type_attr(key.0, entry)?;
        let mut parameters = Vec::new();
        {
            let unit = &self.units[key.0];
            let mut tree = unit
                .entries_tree(Some(UnitOffset(key.1)))
                .map_err(|err| map_dwarf_error("building function tree", err))?;
            let root = tree.root().map_err(|err| map_dwarf_error("navigating function root", err))?;
            let mut children = root.children();
            while let Some(child) = children
                .next()
                .map_err(|err| map_dwarf_error("iterating function parameters", err))?
            {
                let child_entry = child.entry();
                if child_entry.tag() != constants::DW_TAG_formal_parameter
                    || flag_attr(child_entry, constants::DW_AT_artificial)?
                {
                    continue;
                }
                parameters.push(type_ref(self.units, &self.signatures, key.0, child_entry)?);
            }
        }
        let arguments: Vec<TypeId> = parameters.into_iter().map(|target| self.resolve(target)).collect();
        let info = FuncTypeInfo {
            return_type_id,
            arg_count: u32::try_from(arguments.len()).unwrap_or(u32::MAX),
            calling_convention: CallingConvention::Cdecl,
            class_parent_id: class_parent,
            this_adjust: 0,
        };
        Ok((info, arguments))
    }

    /// Element counts of each `DW_TAG_subrange_type`, outermost first.
    fn array_dimensions(&self, key: DieKey) -> TypeResult<Vec<u64>>
    {
        let unit = &self.units[key.0];
        let mut tree = unit
            .entries_tree(Some(UnitOffset(key.1)))
            .map_err(|err| map_dwarf_error("building array tree", err))?;
        let root = tree.root().map_err(|err| map_dwarf_error("navigating array root", err))?;
        let mut children = root.children();
        let mut dimensions = Vec::new();
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating array dimensions", err))?
        {
            let entry = child.entry();
            if entry.tag() != constants::DW_TAG_subrange_type {
                continue;
            }
            let count = match udata_attr(entry, constants::DW_AT_count)? {
                Some(count) => count,
                None => entry
                    .attr(constants::DW_AT_upper_bound)
                    .map_err(|err| map_dwarf_error("reading DW_AT_upper_bound", err))?
                    .and_then(|attr| match attr.value() {
                        AttributeValue::Sdata(value) if value < 0 => Some(0),
                        _ => attr.udata_value().map(|upper| upper + 1),
                    })
                    .unwrap_or(0),
            };
            dimensions.push(count);
        }
        Ok(dimensions)
    }

    /// Byte offset and bitfield placement of a data member.
    fn member_placement(
        &self,
        key: DieKey,
        entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    ) -> TypeResult<(u64, Option<Bitfield>)>
    {
        let location = member_location(entry)?;
        let Some(bit_size) = udata_attr(entry, constants::DW_AT_bit_size)? else {
            return Ok((location.unwrap_or(0), None));
        };
        let length = u32::try_from(bit_size).unwrap_or(u32::MAX);

        if let Some(data_bit_offset) = udata_attr(entry, constants::DW_AT_data_bit_offset)? {
            let storage_bytes = self.storage_size(key.0, entry)?.max(1);
            let storage_bits = storage_bytes * 8;
            let offset = data_bit_offset / storage_bits * storage_bytes;
            let position = u32::try_from(data_bit_offset - offset * 8).unwrap_or(u32::MAX);
            return Ok((offset, Some(Bitfield::new(length, position))));
        }

        let offset = location.unwrap_or(0);
        if let Some(bit_offset) = udata_attr(entry, constants::DW_AT_bit_offset)? {
            let storage_bits = match udata_attr(entry, constants::DW_AT_byte_size)? {
                Some(bytes) => bytes * 8,
                None => self.storage_size(key.0, entry)? * 8,
            };
            let position = storage_bits.saturating_sub(bit_offset + bit_size);
            return Ok((offset, Some(Bitfield::new(length, u32::try_from(position).unwrap_or(0)))));
        }
        Ok((offset, Some(Bitfield::new(length, 0))))
    }

    /// Byte size of the type a member refers to, following typedefs and cv-qualifiers.
    fn storage_size(&self, unit_index: usize, entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> TypeResult<u64>
    {
        let mut target = type_ref(self.units, &self.signatures, unit_index, entry)?;
        for _ in 0..MAX_TYPE_REF_DEPTH {
            let Some(key) = target else {
                break;
            };
            let die = self.units[key.0]
                .entry(UnitOffset(key.1))
                .map_err(|err| map_dwarf_error("reading member type", err))?;
            if let Some(size) = udata_attr(&die, constants::DW_AT_byte_size)? {
                return Ok(size);
            }
            target = type_ref(self.units, &self.signatures, key.0, &die)?;
        }
        Ok(4)
    }

    fn vtable_record(&mut self, pending: &Pending, entry: &DebuggingInformationEntry<'_, '_, OwnedReader>)
        -> TypeResult<Record>
    {
        let Some(owner) = pending.parent else {
            return Err(TypeError::Dwarf("vtable pointer outside a class".to_string()));
        };
        let slot_count = self.vtable_slot_count(owner.key)?;
        let shape = self
            .records
            .insert_record(self.module, Record::VTableShape(VTableShapeInfo { slot_count }));
        if let Some(Record::Udt(info)) = self.records.record_mut(self.module, owner.id) {
            info.vtable_shape_id = Some(shape);
        }
        Ok(Record::VTable(VTableInfo {
            owning_class_id: owner.id,
            vtable_shape_id: shape,
            offset: member_location(entry)?.unwrap_or(0),
        }))
    }

    /// One past the highest `DW_AT_vtable_elem_location` among a class's methods.
    fn vtable_slot_count(&self, class: DieKey) -> TypeResult<u32>
    {
        let unit = &self.units[class.0];
        let mut tree = unit
            .entries_tree(Some(UnitOffset(class.1)))
            .map_err(|err| map_dwarf_error("building class tree", err))?;
        let root = tree.root().map_err(|err| map_dwarf_error("navigating class root", err))?;
        let mut children = root.children();
        let mut slots = 0u64;
        while let Some(child) = children
            .next()
            .map_err(|err| map_dwarf_error("iterating class methods", err))?
        {
            let entry = child.entry();
            if entry.tag() != constants::DW_TAG_subprogram {
                continue;
            }
            let Some(attr) = entry
                .attr(constants::DW_AT_vtable_elem_location)
                .map_err(|err| map_dwarf_error("reading DW_AT_vtable_elem_location", err))?
            else {
                continue;
            };
            let slot = match attr.value() {
                AttributeValue::Exprloc(expression) => expression_operand(&expression, constants::DW_OP_constu),
                _ => attr.udata_value(),
            };
            if let Some(slot) = slot {
                slots = slots.max(slot + 1);
            }
        }
        Ok(u32::try_from(slots).unwrap_or(u32::MAX))
    }
}

fn qualify(scopes: &[Scope], name: &str) -> String
{
    let mut qualified = String::new();
    for segment in scopes.iter().filter_map(|scope| scope.segment.as_deref()) {
        qualified.push_str(segment);
        qualified.push_str("::");
    }
    qualified.push_str(name);
    qualified
}

fn qualify_unnamed(pending: &Pending) -> String
{
    tracing::trace!(offset = pending.key.1, "anonymous type");
    UNNAMED_TAG.to_string()
}

/// Pick the DbgHelp-style basic type for a DWARF base type.
fn basic_type_for(encoding: DwAte, size: u64, name: &str) -> BasicType
{
    let is_long = name.contains("long");
    match encoding {
        constants::DW_ATE_boolean => BasicType::Bool,
        constants::DW_ATE_float => BasicType::Float,
        constants::DW_ATE_signed_char => BasicType::Char,
        constants::DW_ATE_unsigned_char if name == "char" => BasicType::Char,
        constants::DW_ATE_unsigned_char => BasicType::UInt,
        constants::DW_ATE_UTF => match size {
            1 => BasicType::Char8,
            2 => BasicType::Char16,
            _ => BasicType::Char32,
        },
        constants::DW_ATE_signed | constants::DW_ATE_unsigned if name == "wchar_t" && size == 2 => BasicType::WChar,
        constants::DW_ATE_signed if is_long => BasicType::Long,
        constants::DW_ATE_signed => BasicType::Int,
        constants::DW_ATE_unsigned if is_long => BasicType::ULong,
        constants::DW_ATE_unsigned => BasicType::UInt,
        other => BasicType::Unknown(u32::from(other.0)),
    }
}

fn entry_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> TypeResult<Option<String>>
{
    let Some(attr) = entry
        .attr(constants::DW_AT_name)
        .map_err(|err| map_dwarf_error("reading DW_AT_name", err))?
    else {
        return Ok(None);
    };
    let reader = dwarf
        .attr_string(unit, attr.value())
        .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
    let owned = match reader.to_string() {
        Ok(cow) => cow.into_owned(),
        Err(_) => reader
            .to_string_lossy()
            .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
            .into_owned(),
    };
    Ok(Some(owned))
}

fn udata_attr(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>, name: DwAt) -> TypeResult<Option<u64>>
{
    Ok(entry
        .attr(name)
        .map_err(|err| map_dwarf_error("reading attribute", err))?
        .and_then(|attr| attr.udata_value()))
}

fn flag_attr(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>, name: DwAt) -> TypeResult<bool>
{
    Ok(matches!(
        entry
            .attr(name)
            .map_err(|err| map_dwarf_error("reading flag", err))?
            .map(|attr| attr.value()),
        Some(AttributeValue::Flag(true))
    ))
}

/// `DW_AT_data_member_location` as a constant or a `DW_OP_plus_uconst` expression.
fn member_location(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> TypeResult<Option<u64>>
{
    let Some(attr) = entry
        .attr(constants::DW_AT_data_member_location)
        .map_err(|err| map_dwarf_error("reading DW_AT_data_member_location", err))?
    else {
        return Ok(None);
    };
    Ok(match attr.value() {
        AttributeValue::Exprloc(expression) => expression_operand(&expression, constants::DW_OP_plus_uconst),
        _ => attr.udata_value(),
    })
}

/// Static address of a variable whose location is a single `DW_OP_addr`.
fn variable_address(
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> TypeResult<Option<u64>>
{
    let Some(attr) = entry
        .attr(constants::DW_AT_location)
        .map_err(|err| map_dwarf_error("reading DW_AT_location", err))?
    else {
        return Ok(None);
    };
    let AttributeValue::Exprloc(expression) = attr.value() else {
        return Ok(None);
    };
    let mut reader = expression.0.clone();
    match reader.read_u8() {
        Ok(op) if op == constants::DW_OP_addr.0 => Ok(reader.read_address(unit.encoding().address_size).ok()),
        _ => Ok(None),
    }
}

/// Operand of a one-operation expression using `opcode` with a ULEB128 argument.
fn expression_operand(expression: &gimli::Expression<OwnedReader>, opcode: DwOp) -> Option<u64>
{
    let mut reader = expression.0.clone();
    let op = reader.read_u8().ok()?;
    if op != opcode.0 {
        return None;
    }
    reader.read_uleb128().ok()
}

fn type_ref(
    units: &[Unit<OwnedReader>],
    signatures: &HashMap<u64, DieKey>,
    unit_index: usize,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> TypeResult<Option<DieKey>>
{
    Ok(entry
        .attr(constants::DW_AT_type)
        .map_err(|err| map_dwarf_error("reading DW_AT_type", err))?
        .and_then(|attr| die_ref(units, signatures, unit_index, attr.value())))
}

fn die_ref(
    units: &[Unit<OwnedReader>],
    signatures: &HashMap<u64, DieKey>,
    unit_index: usize,
    value: AttributeValue<OwnedReader>,
) -> Option<DieKey>
{
    match value {
        AttributeValue::UnitRef(offset) => Some(DieKey(unit_index, offset.0)),
        AttributeValue::DebugInfoRef(offset) => {
            let target = UnitSectionOffset::from(offset);
            units
                .iter()
                .enumerate()
                .find_map(|(index, unit)| target.to_unit_offset(unit).map(|offset| DieKey(index, offset.0)))
        }
        AttributeValue::DebugTypesRef(signature) => signatures.get(&signature.0).copied(),
        _ => None,
    }
}

/// Back loadable sections with their file bytes so statics can be read.
fn map_file_sections(file: &object::File<'_>, records: &mut MemorySession, relocate: impl Fn(u64) -> u64)
    -> TypeResult<()>
{
    for section in file.sections() {
        if section.address() == 0 {
            continue;
        }
        let address = Address::new(relocate(section.address()));
        match section.kind() {
            SectionKind::Text
            | SectionKind::Data
            | SectionKind::ReadOnlyData
            | SectionKind::ReadOnlyDataWithRel
            | SectionKind::ReadOnlyString => {
                let data = section
                    .data()
                    .map_err(|err| TypeError::Dwarf(format!("failed to read section data: {err}")))?;
                if !data.is_empty() {
                    records.write_memory(address, data);
                }
            }
            SectionKind::UninitializedData if section.size() <= MAX_ZERO_FILL => {
                let size = usize::try_from(section.size()).unwrap_or(0);
                records.write_memory(address, &vec![0; size]);
            }
            _ => {}
        }
    }
    Ok(())
}

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offsets"]),
    (".debug_types", &[".debug_types", "__debug_types"]),
    (".debug_loc", &[".debug_loc", "__debug_loc"]),
    (".debug_loclists", &[".debug_loclists", "__debug_loclists"]),
];

fn section_reader(sections: &HashMap<&'static str, Arc<[u8]>>, id: SectionId, endian: RunTimeEndian) -> OwnedReader
{
    let key = match id {
        SectionId::DebugAbbrev => ".debug_abbrev",
        SectionId::DebugAddr => ".debug_addr",
        SectionId::DebugInfo => ".debug_info",
        SectionId::DebugLine => ".debug_line",
        SectionId::DebugLineStr => ".debug_line_str",
        SectionId::DebugRanges => ".debug_ranges",
        SectionId::DebugRngLists => ".debug_rnglists",
        SectionId::DebugStr => ".debug_str",
        SectionId::DebugStrOffsets => ".debug_str_offsets",
        SectionId::DebugTypes => ".debug_types",
        SectionId::DebugLoc => ".debug_loc",
        SectionId::DebugLocLists => ".debug_loclists",
        _ => "",
    };

    let data = sections
        .get(key)
        .cloned()
        .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
    EndianArcSlice::new(data, endian)
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> TypeResult<Arc<[u8]>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| TypeError::Dwarf(format!("failed to read {name}: {err}")))?;
            return Ok(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes.to_vec()),
                Cow::Owned(vec) => vec.into(),
            });
        }
    }

    Ok(Arc::<[u8]>::from(Vec::new()))
}

fn load_units(dwarf: &OwnedDwarf) -> TypeResult<Vec<Unit<OwnedReader>>>
{
    let mut units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers
        .next()
        .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
    {
        units.push(
            dwarf
                .unit(header)
                .map_err(|err| map_dwarf_error("parsing compilation unit", err))?,
        );
    }
    let mut type_headers = dwarf.type_units();
    while let Some(header) = type_headers
        .next()
        .map_err(|err| map_dwarf_error("reading .debug_types unit header", err))?
    {
        units.push(dwarf.unit(header).map_err(|err| map_dwarf_error("parsing type unit", err))?);
    }
    Ok(units)
}

fn map_dwarf_error(context: &str, err: gimli::Error) -> TypeError
{
    TypeError::Dwarf(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_basic_type_for_common_encodings()
    {
        assert_eq!(basic_type_for(constants::DW_ATE_signed, 4, "int"), BasicType::Int);
        assert_eq!(basic_type_for(constants::DW_ATE_signed, 8, "long int"), BasicType::Long);
        assert_eq!(basic_type_for(constants::DW_ATE_unsigned, 8, "long unsigned int"), BasicType::ULong);
        assert_eq!(basic_type_for(constants::DW_ATE_signed_char, 1, "char"), BasicType::Char);
        assert_eq!(basic_type_for(constants::DW_ATE_unsigned_char, 1, "unsigned char"), BasicType::UInt);
        assert_eq!(basic_type_for(constants::DW_ATE_boolean, 1, "bool"), BasicType::Bool);
        assert_eq!(basic_type_for(constants::DW_ATE_float, 8, "double"), BasicType::Float);
        assert_eq!(basic_type_for(constants::DW_ATE_UTF, 2, "char16_t"), BasicType::Char16);
        assert_eq!(basic_type_for(constants::DW_ATE_unsigned, 2, "wchar_t"), BasicType::WChar);
    }

    #[test]
    fn test_qualify_joins_scope_segments()
    {
        let scopes = vec![
            Scope {
                depth: 1,
                segment: Some("ns".to_string()),
                parent: None,
                opaque: false,
            },
            Scope {
                depth: 2,
                segment: None,
                parent: None,
                opaque: false,
            },
            Scope {
                depth: 3,
                segment: Some("Outer".to_string()),
                parent: None,
                opaque: false,
            },
        ];
        assert_eq!(qualify(&scopes, "Inner"), "ns::Outer::Inner");
        assert_eq!(qualify(&[], "int"), "int");
    }

    #[test]
    fn test_load_missing_file_is_io_error()
    {
        let err = DwarfSession::load("/nonexistent/ferrotype-test-binary", DwarfSessionOptions::default()).unwrap_err();
        assert!(matches!(err, TypeError::Io(_)));
    }
}
