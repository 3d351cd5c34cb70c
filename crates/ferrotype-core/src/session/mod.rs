//! # Debugger Session
//!
//! The interface the type model consumes from the native symbol engine.
//!
//! The registry never parses debug information itself. It asks a
//! [`DebuggerSession`] for one raw record at a time, keyed by
//! `(module, type id)`, and builds nodes from the answers. Each platform
//! backend implements this trait with its own engine:
//!
//! - [`MemorySession`]: records supplied up front by the host (and tests)
//! - [`DwarfSession`]: records decoded from a binary's DWARF sections
//!
//! ## Thread Safety
//!
//! Native symbol engines are generally not reentrant. Sessions are driven
//! from the thread that owns the debug target, and nothing in this crate
//! calls into a session concurrently.

pub mod dwarf;
pub mod memory;
pub mod records;

pub use dwarf::{DwarfSession, DwarfSessionOptions};
pub use memory::MemorySession;
pub use records::{
    ArrayTypeInfo, BaseClassInfo, BaseTypeInfo, CallingConvention, DataInfo, DataKind, EnumInfo, FuncArgTypeInfo,
    FuncInfo, FuncTypeInfo, GeneratedTypeInfo, PointerTypeInfo, SymTag, TypedefInfo, UdtInfo, UdtKind, VTableInfo,
    VTableShapeInfo,
};

use crate::error::{TypeError, TypeResult};
use crate::types::{Address, ModuleBase, TargetWidth, TypeId};

/// Raw type-record source backing a [`crate::TypeRegistry`]
///
/// Every `*_info` method answers for a single id. Asking for the wrong kind
/// of record (e.g. `udt_info` on a pointer id) is a session-level failure and
/// should be reported as an error, never as a default-constructed record.
///
/// ## Errors
///
/// - `NotFound`: the session has no record for the id
/// - `SessionUnavailable`: the engine could not be queried
pub trait DebuggerSession
{
    /// Classify a record.
    fn sym_tag(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<SymTag>;

    /// Name and size of a debugger-synthesized id, or `None` for ids backed
    /// by a real symbol record.
    ///
    /// The default implementation reports no synthesized ids.
    fn generated_type_info(&self, _module: ModuleBase, _type_id: TypeId) -> TypeResult<Option<GeneratedTypeInfo>>
    {
        Ok(None)
    }

    fn base_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<BaseTypeInfo>;

    fn array_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<ArrayTypeInfo>;

    fn pointer_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<PointerTypeInfo>;

    fn udt_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<UdtInfo>;

    fn base_class_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<BaseClassInfo>;

    fn enum_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<EnumInfo>;

    fn data_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<DataInfo>;

    fn func_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<FuncInfo>;

    fn func_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<FuncTypeInfo>;

    fn func_arg_type_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<FuncArgTypeInfo>;

    fn vtable_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<VTableInfo>;

    fn vtable_shape_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<VTableShapeInfo>;

    fn typedef_info(&self, module: ModuleBase, type_id: TypeId) -> TypeResult<TypedefInfo>;

    /// Child ids of a UDT, enum or function type, in declaration order.
    ///
    /// `count` is the child count from the parent's own record; sessions
    /// may use it to size their request.
    fn children_ids(&self, module: ModuleBase, parent: TypeId, count: u32) -> TypeResult<Vec<TypeId>>;

    /// Pointer width of the debug target.
    fn target_width(&self) -> TargetWidth;

    /// Pointer size in bytes (4 or 8).
    fn pointer_size(&self) -> u64
    {
        self.target_width().pointer_size_bytes()
    }

    /// Fill `buf` from target memory at `address`.
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> TypeResult<()>;

    /// Fill `buf` with the low bytes of a register.
    ///
    /// The default implementation reports that registers are not available,
    /// which is the case for sessions without a live thread context.
    fn read_register(&self, register: u32, _buf: &mut [u8]) -> TypeResult<()>
    {
        Err(TypeError::Unsupported(format!("register {register} is not readable from this session")))
    }
}
