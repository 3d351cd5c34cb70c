//! # Error Types
//!
//! General error handling for the type model.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::{Address, ModuleBase, TypeId};

/// Main error type for type-model operations
///
/// ## Error Categories
///
/// 1. **Caller errors**: InvalidArgument, MemberNotFound, NotAUdt, PointerInPath
/// 2. **Session errors**: NotFound, SessionUnavailable, MemoryRead
/// 3. **Data errors**: UnexpectedSymTag, UnexpectedBasicType
/// 4. **Gaps**: Unsupported (virtual-base member aggregation)
/// 5. **Loader errors**: Dwarf, Io
#[derive(Error, Debug)]
pub enum TypeError
{
    /// The debugger session has no record for the requested type id
    ///
    /// Type ids are only meaningful within the module that defines them, so
    /// both halves of the key are reported.
    #[error("Type not found: id {type_id} in module {module}")]
    NotFound
    {
        /// Image the id was looked up in
        module: ModuleBase,
        /// Module-scoped type id
        type_id: TypeId,
    },

    /// The session collaborator could not service the request
    ///
    /// This is the typed form of "the debugger went away": the target was
    /// detached, the symbol engine failed, or the module was unloaded.
    #[error("Debugger session unavailable: {0}")]
    SessionUnavailable(String),

    /// Invalid argument passed to a type-model function
    ///
    /// Examples:
    /// - A multi-match wildcard (`?*`) that is not the last template parameter
    /// - An empty member path
    /// - Asking for UDT children of a pointer node
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The record's symbol tag has no corresponding node variant
    #[error("Unexpected symbol tag {tag} for id {type_id}")]
    UnexpectedSymTag
    {
        /// Raw tag value reported by the session
        tag: String,
        /// Id that carried the tag
        type_id: TypeId,
    },

    /// A (basic type, byte width) pair that no primitive maps onto
    ///
    /// This indicates inconsistent symbol data rather than a caller mistake.
    #[error("Unexpected basic type {tag} with width {width}")]
    UnexpectedBasicType
    {
        /// Basic type tag
        tag: String,
        /// Width in bytes
        width: u64,
    },

    /// The operation is deliberately not implemented
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A member path segment did not name a member of the current type
    #[error("Type {type_name} has no member named {member}")]
    MemberNotFound
    {
        /// Name of the type that was searched
        type_name: String,
        /// Segment that failed to resolve
        member: String,
    },

    /// A member path continued through a member whose type is not a UDT
    #[error("Member path {path} continues through non-UDT type {type_name}")]
    NotAUdt
    {
        /// Path consumed so far
        path: String,
        /// Name of the offending type
        type_name: String,
    },

    /// A member path continued through a pointer
    ///
    /// Offsets cannot be accumulated across an indirection.
    #[error("Member path {path} continues through a pointer")]
    PointerInPath
    {
        /// Path consumed so far
        path: String,
    },

    /// Failed to read raw bytes from the target
    #[error("Failed to read memory at {address}: {details}")]
    MemoryRead
    {
        /// Address of the attempted read
        address: Address,
        /// Additional error details
        details: String,
    },

    /// DWARF data could not be parsed
    #[error("DWARF error: {0}")]
    Dwarf(String),

    /// I/O error (loading a binary from disk)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TypeError
{
    /// Shorthand for [`TypeError::NotFound`].
    #[must_use]
    pub fn not_found(module: ModuleBase, type_id: TypeId) -> Self
    {
        TypeError::NotFound { module, type_id }
    }
}

/// Convenience type alias for `Result<T, TypeError>`
///
/// ```rust
/// use ferrotype_core::error::TypeResult;
/// fn foo() -> TypeResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type TypeResult<T> = std::result::Result<T, TypeError>;
