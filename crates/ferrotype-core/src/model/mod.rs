//! # Type Nodes
//!
//! The closed set of node variants a type record can resolve to.
//!
//! Every node shares a [`TypeKey`] and a set of memoized cells; the
//! variant-specific payload lives in [`TypeNodeKind`]. Payloads never hold
//! other nodes, only keys, so cyclic type graphs (a class whose method takes
//! the class by pointer, a base class referring back to its UDT) need no
//! reference cycles. The [`crate::TypeRegistry`] turns keys back into nodes.
//!
//! Derived values (name, size, children, layouts, template tree) are computed
//! by the registry on first use and written into the node's cells exactly
//! once.

pub mod layout;
pub mod udt;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

pub use layout::{InstanceLayout, LayoutItem, LayoutItemKind, LayoutOrder, VTableHit};
pub use udt::{Enumerand, UdtChildren, UdtMember};

use crate::session::{CallingConvention, UdtKind};
use crate::template::TemplateNode;
use crate::types::{Address, ModuleBase, TypeId, TypeKey};
use crate::value::{BasicType, Bitfield, PrimitiveValue};

/// A resolved type record
///
/// Nodes are only created by [`crate::TypeRegistry::resolve`] and are shared
/// behind `Arc`s; resolving the same key twice returns the same instance.
#[derive(Debug)]
pub struct TypeNode
{
    key: TypeKey,
    kind: TypeNodeKind,
    pub(crate) cache: NodeCache,
}

impl TypeNode
{
    pub(crate) fn new(key: TypeKey, kind: TypeNodeKind) -> Self
    {
        Self {
            key,
            kind,
            cache: NodeCache::default(),
        }
    }

    pub fn key(&self) -> TypeKey
    {
        self.key
    }

    pub fn type_id(&self) -> TypeId
    {
        self.key.type_id
    }

    pub fn module(&self) -> ModuleBase
    {
        self.key.module
    }

    pub fn kind(&self) -> &TypeNodeKind
    {
        &self.kind
    }

    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str
    {
        self.kind.label()
    }

    pub fn is_udt(&self) -> bool
    {
        matches!(self.kind, TypeNodeKind::Udt(_))
    }

    pub fn as_udt(&self) -> Option<&UdtType>
    {
        match &self.kind {
            TypeNodeKind::Udt(udt) => Some(udt),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerType>
    {
        match &self.kind {
            TypeNodeKind::Pointer(pointer) => Some(pointer),
            _ => None,
        }
    }

    pub fn as_data_member(&self) -> Option<&DataMember>
    {
        match &self.kind {
            TypeNodeKind::DataMember(member) => Some(member),
            _ => None,
        }
    }
}

/// Memoized derived state of a node
///
/// Each cell is written at most once. Population builds the complete value
/// before publishing it, so readers never observe a partial result.
#[derive(Debug, Default)]
pub(crate) struct NodeCache
{
    pub(crate) name: OnceCell<String>,
    pub(crate) size: OnceCell<u64>,
    pub(crate) template: OnceCell<Arc<TemplateNode>>,
    pub(crate) children: OnceCell<Arc<UdtChildren>>,
    pub(crate) declaration_layout: OnceCell<Arc<InstanceLayout>>,
    pub(crate) offset_layout: OnceCell<Arc<InstanceLayout>>,
    pub(crate) enumerands: OnceCell<Arc<[Enumerand]>>,
    pub(crate) arguments: OnceCell<Arc<[TypeKey]>>,
}

/// Variant payload of a [`TypeNode`]
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNodeKind
{
    Base(BaseType),
    Pointer(PointerType),
    Array(ArrayType),
    Enum(EnumType),
    Typedef(TypedefType),
    Udt(UdtType),
    BaseClass(BaseClass),
    VirtualBaseClass(VirtualBaseClass),
    DataMember(DataMember),
    StaticDataMember(StaticDataMember),
    Function(Function),
    FunctionType(FunctionType),
    FunctionArgType(FunctionArgType),
    VTable(VTable),
    VTableShape(VTableShape),
    /// `SymTagNull`: a record that describes nothing
    Null,
    /// Debugger-synthesized id with no symbol record behind it
    Generated(GeneratedType),
}

impl TypeNodeKind
{
    pub fn label(&self) -> &'static str
    {
        match self {
            TypeNodeKind::Base(_) => "base type",
            TypeNodeKind::Pointer(_) => "pointer",
            TypeNodeKind::Array(_) => "array",
            TypeNodeKind::Enum(_) => "enum",
            TypeNodeKind::Typedef(_) => "typedef",
            TypeNodeKind::Udt(_) => "UDT",
            TypeNodeKind::BaseClass(_) => "base class",
            TypeNodeKind::VirtualBaseClass(_) => "virtual base class",
            TypeNodeKind::DataMember(_) => "data member",
            TypeNodeKind::StaticDataMember(_) => "static data member",
            TypeNodeKind::Function(_) => "function",
            TypeNodeKind::FunctionType(_) => "function type",
            TypeNodeKind::FunctionArgType(_) => "function argument",
            TypeNodeKind::VTable(_) => "vtable",
            TypeNodeKind::VTableShape(_) => "vtable shape",
            TypeNodeKind::Null => "null",
            TypeNodeKind::Generated(_) => "generated type",
        }
    }
}

impl fmt::Display for TypeNodeKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseType
{
    pub basic_type: BasicType,
    pub size: u64,
    /// Spelling from the symbol source; the conventional name is used otherwise
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerType
{
    pub pointee: TypeKey,
    pub size: u64,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType
{
    pub element: TypeKey,
    pub count: u64,
    /// Size as recorded; zero when the source omits it
    pub declared_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType
{
    pub name: String,
    pub base_type: TypeKey,
    pub size: u64,
    pub class_parent: Option<TypeKey>,
    pub child_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedefType
{
    pub name: String,
    pub represented: TypeKey,
}

/// Struct, class, union or interface
///
/// Members, bases, nested types and the vtable are populated in one shot by
/// [`crate::TypeRegistry::udt_children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtType
{
    pub name: String,
    pub kind: UdtKind,
    pub size: u64,
    pub class_parent: Option<TypeKey>,
    pub vtable_shape: Option<TypeKey>,
    pub child_count: u32,
}

/// Non-virtual base class at a fixed offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseClass
{
    pub base_type: TypeKey,
    pub offset: u64,
}

/// Virtual base class, located at run time through the virtual base table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualBaseClass
{
    pub base_type: TypeKey,
    pub is_indirect: bool,
    pub disp_index: u32,
    pub pointer_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMember
{
    pub name: String,
    pub member_type: TypeKey,
    pub offset: u64,
    pub bitfield: Option<Bitfield>,
    pub owner: Option<TypeKey>,
}

/// Static member, global, or constant symbol
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDataMember
{
    pub name: String,
    pub member_type: TypeKey,
    pub address: Option<Address>,
    /// Stored value of a constant; reads return it without touching memory
    pub value: Option<PrimitiveValue>,
    pub owner: Option<TypeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function
{
    pub name: String,
    pub function_type: TypeKey,
    pub address: Option<Address>,
    pub length: u64,
    pub owner: Option<TypeKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType
{
    pub return_type: TypeKey,
    pub arg_count: u32,
    pub calling_convention: CallingConvention,
    pub class_parent: Option<TypeKey>,
    pub this_adjust: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionArgType
{
    pub arg_type: TypeKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTable
{
    pub owner: TypeKey,
    pub shape: TypeKey,
    /// Offset of the vtable pointer inside its owning class
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTableShape
{
    pub slot_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType
{
    pub name: String,
    pub size: u64,
}
