//! # ferrotype-core
//!
//! Lazily materialized model of C/C++ debug types.
//!
//! A [`TypeRegistry`] sits on top of a [`session::DebuggerSession`] (the
//! native symbol engine) and turns raw type records into shared, memoized
//! [`model::TypeNode`]s. On top of that it provides:
//! - Instance layouts with vtable pointers interleaved between members
//! - Member offset lookup through dotted paths such as `"header.flags"`
//! - Primitive value reads, including bitfields and stored constants
//! - Structural equality of types across modules
//! - Template name parsing and wildcard matching (`std::vector<?*>`)
//!
//! ## Sessions
//!
//! - [`session::MemorySession`]: records registered by the host
//! - [`session::DwarfSession`]: records decoded from an ELF or Mach-O binary
//!
//! ## Threading
//!
//! Node state is write-once, so nodes can be read from any thread once
//! built. The session itself is driven from one thread at a time.

pub mod error;
pub mod model;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod template;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{TypeError, TypeResult};
pub use model::{TypeNode, TypeNodeKind};
pub use registry::{RegistryOptions, TypeRegistry};
pub use template::{crack, Template, TemplateNode};
