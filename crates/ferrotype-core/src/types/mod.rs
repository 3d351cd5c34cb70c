//! # Types
//!
//! Identity and addressing primitives shared by the whole crate.
//!
//! Nodes in the type graph never hold references to each other. They hold
//! [`TypeKey`]s, and the registry turns a key back into a node on demand.

pub mod address;
pub mod ids;
pub mod target;

// Re-export all public types
pub use address::Address;
pub use ids::{ModuleBase, TypeId, TypeKey};
pub use target::TargetWidth;
