//! Entity schema system — field metadata, descriptors, and the registry
//!
//! - `field`: declared field names and types
//! - `descriptor`: per-entity-type table/key/field/relationship declaration
//! - `registry`: validated-once, process-shareable descriptor cache

pub mod descriptor;
pub mod field;
pub mod registry;

pub use descriptor::EntityDescriptor;
pub use field::{FieldMeta, FieldType};
pub use registry::{Entity, SchemaRegistry};
