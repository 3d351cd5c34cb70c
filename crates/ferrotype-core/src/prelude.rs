//! Common module for library exports

pub use crate::error::{TypeError, TypeResult};
pub use crate::model::{
    Enumerand, InstanceLayout, LayoutItem, LayoutItemKind, LayoutOrder, TypeNode, TypeNodeKind, UdtChildren,
    UdtMember, VTableHit,
};
pub use crate::registry::{DiagnosticSink, RegistryOptions, TypeRegistry};
pub use crate::session::{
    CallingConvention, DataKind, DebuggerSession, DwarfSession, DwarfSessionOptions, MemorySession, SymTag, UdtKind,
};
pub use crate::template::{crack, Template, TemplateNode};
pub use crate::types::{Address, ModuleBase, TargetWidth, TypeId, TypeKey};
pub use crate::value::{BasicType, Bitfield, PrimitiveValue, ValueLocation};
