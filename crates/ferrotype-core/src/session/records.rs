//! Raw type records as reported by a debugger session.
//!
//! These mirror the shape of the symbol engine's answers. They carry type ids,
//! never nodes; turning ids into nodes is the registry's job.

use std::fmt;

use crate::types::{Address, TypeId};
use crate::value::{BasicType, Bitfield, PrimitiveValue};

/// Symbol tag classifying a record
///
/// Numbering follows DbgHelp's `SymTagEnum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymTag
{
    Null,
    Exe,
    Compiland,
    Function,
    Block,
    Data,
    PublicSymbol,
    Udt,
    Enum,
    FunctionType,
    PointerType,
    ArrayType,
    BaseType,
    Typedef,
    BaseClass,
    Friend,
    FunctionArgType,
    VTableShape,
    VTable,
    Custom,
    Thunk,
    CustomType,
    Dimension,
    BaseInterface,
    /// Any other raw tag value
    Other(u32),
}

impl SymTag
{
    /// Decode a raw DbgHelp `SymTagEnum` value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self
    {
        match raw {
            0 => SymTag::Null,
            1 => SymTag::Exe,
            2 => SymTag::Compiland,
            5 => SymTag::Function,
            6 => SymTag::Block,
            7 => SymTag::Data,
            10 => SymTag::PublicSymbol,
            11 => SymTag::Udt,
            12 => SymTag::Enum,
            13 => SymTag::FunctionType,
            14 => SymTag::PointerType,
            15 => SymTag::ArrayType,
            16 => SymTag::BaseType,
            17 => SymTag::Typedef,
            18 => SymTag::BaseClass,
            19 => SymTag::Friend,
            20 => SymTag::FunctionArgType,
            24 => SymTag::VTableShape,
            25 => SymTag::VTable,
            26 => SymTag::Custom,
            27 => SymTag::Thunk,
            28 => SymTag::CustomType,
            30 => SymTag::Dimension,
            33 => SymTag::BaseInterface,
            other => SymTag::Other(other),
        }
    }
}

impl fmt::Display for SymTag
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            SymTag::Other(raw) => write!(f, "SymTag{raw}"),
            other => write!(f, "SymTag{other:?}"),
        }
    }
}

/// Flavor of a user-defined type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UdtKind
{
    Struct,
    Class,
    Union,
    Interface,
}

impl fmt::Display for UdtKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            UdtKind::Struct => "struct",
            UdtKind::Class => "class",
            UdtKind::Union => "union",
            UdtKind::Interface => "interface",
        };
        write!(f, "{label}")
    }
}

/// Storage kind of a `Data` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind
{
    Unknown,
    Local,
    StaticLocal,
    Param,
    ObjectPtr,
    FileStatic,
    Global,
    Member,
    StaticMember,
    Constant,
}

/// Calling convention of a function type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention
{
    Cdecl,
    FastCall,
    StdCall,
    ThisCall,
    ClrCall,
    VectorCall,
    /// Conventions without a dedicated variant, by raw `CV_call_e` value
    Other(u32),
}

impl CallingConvention
{
    /// Decode a raw CodeView `CV_call_e` value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self
    {
        match raw {
            0x00 => CallingConvention::Cdecl,
            0x04 => CallingConvention::FastCall,
            0x07 => CallingConvention::StdCall,
            0x0b => CallingConvention::ThisCall,
            0x16 => CallingConvention::ClrCall,
            0x18 => CallingConvention::VectorCall,
            other => CallingConvention::Other(other),
        }
    }

    /// Keyword used when printing function types (empty for the default).
    #[must_use]
    pub fn keyword(self) -> &'static str
    {
        match self {
            CallingConvention::Cdecl | CallingConvention::Other(_) => "",
            CallingConvention::FastCall => "__fastcall",
            CallingConvention::StdCall => "__stdcall",
            CallingConvention::ThisCall => "__thiscall",
            CallingConvention::ClrCall => "__clrcall",
            CallingConvention::VectorCall => "__vectorcall",
        }
    }
}

/// `BaseType` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTypeInfo
{
    pub basic_type: BasicType,
    pub size: u64,
    /// Spelling supplied by the symbol source, if any
    pub name: Option<String>,
}

/// `ArrayType` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayTypeInfo
{
    pub element_type_id: TypeId,
    pub count: u64,
    /// Declared total size; zero when the source does not record one
    pub size: u64,
}

/// `PointerType` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerTypeInfo
{
    pub pointee_type_id: TypeId,
    pub size: u64,
    pub is_reference: bool,
}

/// `UDT` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtInfo
{
    pub name: String,
    pub size: u64,
    pub kind: UdtKind,
    /// Enclosing class for nested types
    pub class_parent_id: Option<TypeId>,
    pub vtable_shape_id: Option<TypeId>,
    pub child_count: u32,
}

/// `BaseClass` record
///
/// Direct bases carry `offset`; virtual bases are located at run time
/// through the virtual base table, described by the displacement index and
/// the offset of the virtual base pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseClassInfo
{
    pub base_class_type_id: TypeId,
    pub is_virtual: bool,
    pub is_indirect_virtual: bool,
    pub offset: u64,
    pub virtual_base_disp_index: u32,
    pub virtual_base_pointer_offset: i64,
}

/// `Enum` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo
{
    pub name: String,
    pub base_type_id: TypeId,
    pub size: u64,
    pub class_parent_id: Option<TypeId>,
    pub child_count: u32,
}

/// `Data` record: members, static members, globals and constants
#[derive(Debug, Clone, PartialEq)]
pub struct DataInfo
{
    pub name: String,
    pub type_id: TypeId,
    pub kind: DataKind,
    /// Byte offset inside the containing UDT (members only)
    pub offset: u64,
    pub bitfield: Option<Bitfield>,
    /// Absolute address (statics and globals)
    pub address: Option<Address>,
    /// Stored value (constants and enumerands)
    pub value: Option<PrimitiveValue>,
    pub class_parent_id: Option<TypeId>,
}

/// `Function` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncInfo
{
    pub name: String,
    pub function_type_id: TypeId,
    pub address: Option<Address>,
    pub length: u64,
    pub class_parent_id: Option<TypeId>,
}

/// `FunctionType` record; argument ids are its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncTypeInfo
{
    pub return_type_id: TypeId,
    pub arg_count: u32,
    pub calling_convention: CallingConvention,
    pub class_parent_id: Option<TypeId>,
    pub this_adjust: i64,
}

/// `FunctionArgType` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncArgTypeInfo
{
    pub arg_type_id: TypeId,
}

/// `VTable` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableInfo
{
    pub owning_class_id: TypeId,
    pub vtable_shape_id: TypeId,
    pub offset: u64,
}

/// `VTableShape` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableShapeInfo
{
    pub slot_count: u32,
}

/// `Typedef` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedefInfo
{
    pub name: String,
    pub represented_type_id: TypeId,
}

/// Name and size of a type id the debugger synthesized itself
///
/// Such ids have no symbol record behind them and cannot be introspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTypeInfo
{
    pub name: String,
    pub size: u64,
}
