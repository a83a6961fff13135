//! Relationship system — configuration and join resolution
//!
//! - `descriptor`: how one entity type joins to another
//! - `join`: turning an include list into deterministic JOIN clauses

pub mod descriptor;
pub mod join;

pub use descriptor::{Pivot, RelationshipDescriptor, RelationshipKind};
pub use join::{resolve_includes, ResolvedJoin};
