//! # Type Registry
//!
//! Resolves `(module, type id)` pairs into memoized [`TypeNode`]s.
//!
//! The registry is the only owner of nodes. Nodes refer to each other by
//! [`TypeKey`], and every cross-reference is turned back into a node through
//! [`TypeRegistry::node`]. Resolution itself only fetches the id's own record
//! from the session, so a UDT with a member of its own type (or a pointer to
//! itself) resolves without re-entering construction.
//!
//! ## Lazy state
//!
//! | Derived value          | Computed by                        |
//! |------------------------|------------------------------------|
//! | display name           | [`TypeRegistry::name`]             |
//! | size                   | [`TypeRegistry::size`]             |
//! | UDT children           | [`TypeRegistry::udt_children`]     |
//! | instance layouts       | [`TypeRegistry::layout`]           |
//! | enumerands             | [`TypeRegistry::enumerands`]       |
//! | function arguments     | [`TypeRegistry::function_arguments`] |
//! | template tree          | [`TypeRegistry::template_node`]    |
//!
//! Each is computed on first request and cached on the node.
//!
//! ## Example
//!
//! ```rust
//! use ferrotype_core::prelude::*;
//!
//! let module = ModuleBase(0x7ff6_0000_0000);
//! let mut session = MemorySession::new(TargetWidth::Bits64);
//! let int = session.add_base_type(module, BasicType::Int, 4);
//! let base = session.add_udt(module, "Base", UdtKind::Struct, 8);
//! session.add_member(module, base, "x", int, 4);
//! let derived = session.add_udt(module, "Derived", UdtKind::Struct, 24);
//! session.add_base_class(module, derived, base, 16);
//!
//! let registry = TypeRegistry::new(session);
//! let node = registry.resolve(module, derived).unwrap();
//! assert_eq!(registry.find_member_offset(&node, "x").unwrap(), 20);
//! ```

mod diagnostics;
mod equality;
mod layout;
mod options;
mod udt;
mod values;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use diagnostics::DiagnosticSink;
pub use options::{RegistryOptions, DEFAULT_INTERFACE_SYNONYMS};

use crate::error::{TypeError, TypeResult};
use crate::model::{
    ArrayType, BaseClass, BaseType, DataMember, EnumType, Function, FunctionArgType, FunctionType, GeneratedType,
    PointerType, StaticDataMember, TypeNode, TypeNodeKind, TypedefType, UdtType, VTable, VTableShape,
    VirtualBaseClass,
};
use crate::session::{DataKind, DebuggerSession, SymTag};
use crate::template::{crack, TemplateNode};
use crate::types::{ModuleBase, TypeId, TypeKey};

/// Typedef chains longer than this are treated as cyclic.
const MAX_TYPEDEF_DEPTH: usize = 64;

/// Memoizing resolver from type ids to nodes over one debugger session
#[derive(Debug)]
pub struct TypeRegistry<S>
{
    session: S,
    options: RegistryOptions,
    nodes: RwLock<HashMap<TypeKey, Arc<TypeNode>>>,
    diagnostics: DiagnosticSink,
}

impl<S: DebuggerSession> TypeRegistry<S>
{
    pub fn new(session: S) -> Self
    {
        Self::with_options(session, RegistryOptions::default())
    }

    pub fn with_options(session: S, options: RegistryOptions) -> Self
    {
        Self {
            session,
            options,
            nodes: RwLock::new(HashMap::new()),
            diagnostics: DiagnosticSink::new(),
        }
    }

    pub fn session(&self) -> &S
    {
        &self.session
    }

    pub fn options(&self) -> &RegistryOptions
    {
        &self.options
    }

    pub fn diagnostics(&self) -> &DiagnosticSink
    {
        &self.diagnostics
    }

    /// Pointer size of the debug target in bytes.
    pub fn pointer_size(&self) -> u64
    {
        self.session.pointer_size()
    }

    /// Number of nodes resolved so far.
    pub fn cached_nodes(&self) -> usize
    {
        self.read_nodes().len()
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, HashMap<TypeKey, Arc<TypeNode>>>
    {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, HashMap<TypeKey, Arc<TypeNode>>>
    {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a type id into its node, building it on first request.
    ///
    /// Repeated calls with the same pair return the same `Arc`.
    ///
    /// ## Errors
    ///
    /// - `NotFound` / `SessionUnavailable`: propagated from the session
    /// - `UnexpectedSymTag`: the record's tag has no node variant
    pub fn resolve(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<Arc<TypeNode>>
    {
        let key = TypeKey::new(module, type_id);
        if let Some(node) = self.read_nodes().get(&key) {
            return Ok(Arc::clone(node));
        }

        let kind = self.construct(key)?;
        let node = Arc::clone(
            self.write_nodes()
                .entry(key)
                .or_insert_with(|| Arc::new(TypeNode::new(key, kind))),
        );
        tracing::trace!(%key, kind = node.kind_name(), "resolved type node");
        Ok(node)
    }

    /// Resolve a node by key.
    pub fn node(&self, key: TypeKey) -> TypeResult<Arc<TypeNode>>
    {
        self.resolve(key.module, key.type_id)
    }

    fn construct(&self, key: TypeKey) -> TypeResult<TypeNodeKind>
    {
        let (module, id) = (key.module, key.type_id);
        let session = &self.session;
        let link = |id: TypeId| key.sibling(id);

        if let Some(generated) = session.generated_type_info(module, id)? {
            return Ok(TypeNodeKind::Generated(GeneratedType {
                name: generated.name,
                size: generated.size,
            }));
        }

        let kind = match session.sym_tag(module, id)? {
            SymTag::Null => TypeNodeKind::Null,
            SymTag::BaseType => {
                let info = session.base_type_info(module, id)?;
                TypeNodeKind::Base(BaseType {
                    basic_type: info.basic_type,
                    size: info.size,
                    name: info.name,
                })
            }
            SymTag::PointerType => {
                let info = session.pointer_type_info(module, id)?;
                TypeNodeKind::Pointer(PointerType {
                    pointee: link(info.pointee_type_id),
                    size: if info.size == 0 {
                        session.pointer_size()
                    } else {
                        info.size
                    },
                    is_reference: info.is_reference,
                })
            }
            SymTag::ArrayType => {
                let info = session.array_type_info(module, id)?;
                TypeNodeKind::Array(ArrayType {
                    element: link(info.element_type_id),
                    count: info.count,
                    declared_size: info.size,
                })
            }
            SymTag::Enum => {
                let info = session.enum_info(module, id)?;
                TypeNodeKind::Enum(EnumType {
                    name: info.name,
                    base_type: link(info.base_type_id),
                    size: info.size,
                    class_parent: info.class_parent_id.map(link),
                    child_count: info.child_count,
                })
            }
            SymTag::Typedef => {
                let info = session.typedef_info(module, id)?;
                TypeNodeKind::Typedef(TypedefType {
                    name: info.name,
                    represented: link(info.represented_type_id),
                })
            }
            SymTag::Udt => {
                let info = session.udt_info(module, id)?;
                TypeNodeKind::Udt(UdtType {
                    name: info.name,
                    kind: info.kind,
                    size: info.size,
                    class_parent: info.class_parent_id.map(link),
                    vtable_shape: info.vtable_shape_id.map(link),
                    child_count: info.child_count,
                })
            }
            SymTag::BaseClass => {
                let info = session.base_class_info(module, id)?;
                if info.is_virtual {
                    TypeNodeKind::VirtualBaseClass(VirtualBaseClass {
                        base_type: link(info.base_class_type_id),
                        is_indirect: info.is_indirect_virtual,
                        disp_index: info.virtual_base_disp_index,
                        pointer_offset: info.virtual_base_pointer_offset,
                    })
                } else {
                    TypeNodeKind::BaseClass(BaseClass {
                        base_type: link(info.base_class_type_id),
                        offset: info.offset,
                    })
                }
            }
            SymTag::Data => {
                let info = session.data_info(module, id)?;
                if info.kind == DataKind::Member {
                    TypeNodeKind::DataMember(DataMember {
                        name: info.name,
                        member_type: link(info.type_id),
                        offset: info.offset,
                        bitfield: info.bitfield,
                        owner: info.class_parent_id.map(link),
                    })
                } else {
                    TypeNodeKind::StaticDataMember(StaticDataMember {
                        name: info.name,
                        member_type: link(info.type_id),
                        address: info.address,
                        value: info.value,
                        owner: info.class_parent_id.map(link),
                    })
                }
            }
            SymTag::Function => {
                let info = session.func_info(module, id)?;
                TypeNodeKind::Function(Function {
                    name: info.name,
                    function_type: link(info.function_type_id),
                    address: info.address,
                    length: info.length,
                    owner: info.class_parent_id.map(link),
                })
            }
            SymTag::FunctionType => {
                let info = session.func_type_info(module, id)?;
                TypeNodeKind::FunctionType(FunctionType {
                    return_type: link(info.return_type_id),
                    arg_count: info.arg_count,
                    calling_convention: info.calling_convention,
                    class_parent: info.class_parent_id.map(link),
                    this_adjust: info.this_adjust,
                })
            }
            SymTag::FunctionArgType => {
                let info = session.func_arg_type_info(module, id)?;
                TypeNodeKind::FunctionArgType(FunctionArgType {
                    arg_type: link(info.arg_type_id),
                })
            }
            SymTag::VTable => {
                let info = session.vtable_info(module, id)?;
                TypeNodeKind::VTable(VTable {
                    owner: link(info.owning_class_id),
                    shape: link(info.vtable_shape_id),
                    offset: info.offset,
                })
            }
            SymTag::VTableShape => {
                let info = session.vtable_shape_info(module, id)?;
                TypeNodeKind::VTableShape(VTableShape {
                    slot_count: info.slot_count,
                })
            }
            other => {
                return Err(TypeError::UnexpectedSymTag {
                    tag: other.to_string(),
                    type_id: id,
                });
            }
        };
        Ok(kind)
    }

    /// Display name of a node, computed once.
    pub fn name<'n>(&self, node: &'n TypeNode) -> TypeResult<&'n str>
    {
        node.cache
            .name
            .get_or_try_init(|| self.compute_name(node))
            .map(String::as_str)
    }

    fn compute_name(&self, node: &TypeNode) -> TypeResult<String>
    {
        let name = match node.kind() {
            TypeNodeKind::Base(base) => base
                .name
                .clone()
                .unwrap_or_else(|| base.basic_type.type_name(base.size)),
            TypeNodeKind::Pointer(pointer) => {
                let pointee = self.node(pointer.pointee)?;
                let declarator = if pointer.is_reference { "&" } else { "*" };
                if matches!(pointee.kind(), TypeNodeKind::FunctionType(_)) {
                    self.signature_name(&pointee, declarator)?
                } else {
                    format!("{}{declarator}", self.name(&pointee)?)
                }
            }
            TypeNodeKind::Array(array) => {
                let element = self.node(array.element)?;
                let element_name = self.name(&element)?;
                // Inner dimensions come after outer ones: int[2][3].
                match element_name.find('[') {
                    Some(split) if matches!(element.kind(), TypeNodeKind::Array(_)) => format!(
                        "{}[{}]{}",
                        &element_name[..split],
                        array.count,
                        &element_name[split..]
                    ),
                    _ => format!("{element_name}[{}]", array.count),
                }
            }
            TypeNodeKind::Enum(enumeration) => enumeration.name.clone(),
            TypeNodeKind::Typedef(typedef) => typedef.name.clone(),
            TypeNodeKind::Udt(udt) => udt.name.clone(),
            TypeNodeKind::BaseClass(BaseClass { base_type, .. })
            | TypeNodeKind::VirtualBaseClass(VirtualBaseClass { base_type, .. }) => {
                self.name(&*self.node(*base_type)?)?.to_string()
            }
            TypeNodeKind::DataMember(member) => member.name.clone(),
            TypeNodeKind::StaticDataMember(member) => member.name.clone(),
            TypeNodeKind::Function(function) => function.name.clone(),
            TypeNodeKind::FunctionType(_) => self.signature_name(node, "")?,
            TypeNodeKind::FunctionArgType(argument) => self.name(&*self.node(argument.arg_type)?)?.to_string(),
            TypeNodeKind::VTable(vtable) => format!("{}::`vftable'", self.name(&*self.node(vtable.owner)?)?),
            TypeNodeKind::VTableShape(shape) => format!("<vtable shape: {} slots>", shape.slot_count),
            TypeNodeKind::Null => "<no type>".to_string(),
            TypeNodeKind::Generated(generated) => generated.name.clone(),
        };
        Ok(name)
    }

    /// `R (A, B)` for a bare function type, `R (*)(A, B)` with a declarator.
    fn signature_name(&self, node: &TypeNode, declarator: &str) -> TypeResult<String>
    {
        let TypeNodeKind::FunctionType(function) = node.kind() else {
            return Err(TypeError::InvalidArgument(format!("{} is not a function type", node.key())));
        };
        let return_name = self.name(&*self.node(function.return_type)?)?.to_string();
        let mut arguments = Vec::new();
        for argument in self.function_arguments(node)?.iter() {
            arguments.push(self.name(&*self.node(*argument)?)?.to_string());
        }
        let arguments = arguments.join(", ");
        let keyword = function.calling_convention.keyword();

        Ok(match (keyword.is_empty(), declarator.is_empty()) {
            (true, true) => format!("{return_name} ({arguments})"),
            (false, true) => format!("{return_name} {keyword} ({arguments})"),
            (true, false) => format!("{return_name} ({declarator})({arguments})"),
            (false, false) => format!("{return_name} ({keyword} {declarator})({arguments})"),
        })
    }

    /// Size of a node in bytes, computed once.
    pub fn size(&self, node: &TypeNode) -> TypeResult<u64>
    {
        node.cache.size.get_or_try_init(|| self.compute_size(node)).copied()
    }

    fn compute_size(&self, node: &TypeNode) -> TypeResult<u64>
    {
        let size = match node.kind() {
            TypeNodeKind::Base(base) => base.size,
            TypeNodeKind::Pointer(pointer) => pointer.size,
            TypeNodeKind::Array(array) => {
                let element = self.node(array.element)?;
                let computed = self.size(&element)?.saturating_mul(array.count);
                if array.declared_size == 0 {
                    computed
                } else {
                    if array.declared_size != computed {
                        tracing::warn!(
                            key = %node.key(),
                            declared = array.declared_size,
                            computed,
                            count = array.count,
                            "strange array size; keeping the declared size"
                        );
                    }
                    array.declared_size
                }
            }
            TypeNodeKind::Enum(enumeration) => enumeration.size,
            TypeNodeKind::Typedef(typedef) => {
                let target = self.strip_typedefs(self.node(typedef.represented)?)?;
                self.size(&target)?
            }
            TypeNodeKind::Udt(udt) => udt.size,
            TypeNodeKind::BaseClass(BaseClass { base_type, .. })
            | TypeNodeKind::VirtualBaseClass(VirtualBaseClass { base_type, .. }) => {
                self.size(&*self.node(*base_type)?)?
            }
            TypeNodeKind::DataMember(DataMember { member_type, .. })
            | TypeNodeKind::StaticDataMember(StaticDataMember { member_type, .. }) => {
                self.size(&*self.node(*member_type)?)?
            }
            TypeNodeKind::FunctionArgType(argument) => self.size(&*self.node(argument.arg_type)?)?,
            TypeNodeKind::Function(_) | TypeNodeKind::FunctionType(_) | TypeNodeKind::Null => 0,
            TypeNodeKind::VTable(_) => self.pointer_size(),
            TypeNodeKind::VTableShape(shape) => u64::from(shape.slot_count) * self.pointer_size(),
            TypeNodeKind::Generated(generated) => generated.size,
        };
        Ok(size)
    }

    /// Follow typedefs until a non-typedef node.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the chain does not terminate.
    pub fn strip_typedefs(&self, node: Arc<TypeNode>) -> TypeResult<Arc<TypeNode>>
    {
        let mut current = node;
        for _ in 0..MAX_TYPEDEF_DEPTH {
            let TypeNodeKind::Typedef(typedef) = current.kind() else {
                return Ok(current);
            };
            let next = self.node(typedef.represented)?;
            current = next;
        }
        Err(TypeError::InvalidArgument(format!(
            "typedef chain at {} exceeds {MAX_TYPEDEF_DEPTH} links",
            current.key()
        )))
    }

    /// Template tree of a node's display name, computed once.
    pub fn template_node(&self, node: &TypeNode) -> TypeResult<Arc<TemplateNode>>
    {
        node.cache
            .template
            .get_or_try_init(|| Ok(Arc::new(crack(self.name(node)?))))
            .cloned()
    }

    /// Log a structurally impossible state: loud in debug builds, inert in release.
    fn defect(&self, message: &str)
    {
        tracing::error!(detail = message, "type model invariant violated");
        debug_assert!(false, "{message}");
    }
}
