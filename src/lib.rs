//! strata-orm: a schema-driven model engine for PostgreSQL
//!
//! Entities declare their shape once through [`Entity::descriptor`]; the
//! engine derives everything else from that declaration: parameterized SQL,
//! value binding and decoding, relationship joins, and JSON serialization.
//! There is no per-entity query code and no generated structs.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_orm::{
//!     Connection, Engine, Entity, EntityDescriptor, FieldMeta, FieldType,
//!     FindOptions, PostgresDatabase, SchemaRegistry,
//! };
//!
//! struct Meter;
//!
//! impl Entity for Meter {
//!     fn descriptor() -> EntityDescriptor {
//!         EntityDescriptor::new("meters", "id")
//!             .with_field(FieldMeta::new("id", FieldType::Integer))
//!             .with_field(FieldMeta::new("name", FieldType::Text).required())
//!             .with_timestamps()
//!     }
//! }
//!
//! # async fn demo() -> strata_orm::OrmResult<()> {
//! let db = PostgresDatabase::connect("postgres://localhost/app", 5)
//!     .await
//!     .map_err(strata_orm::OrmError::from_driver)?;
//! let engine = Engine::new(Arc::new(db), Arc::new(SchemaRegistry::new()));
//!
//! let mut payload = serde_json::Map::new();
//! payload.insert("name".into(), serde_json::json!("M1"));
//! let meter = engine.create::<Meter>(payload).await?;
//!
//! let found = engine
//!     .find_by_id::<Meter, _>(meter.primary_key().unwrap().clone(), FindOptions::default())
//!     .await?;
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod database;
pub mod engine;
pub mod error;
pub mod executor;
pub mod instance;
pub mod mapper;
pub mod relationships;
pub mod schema;
pub mod statement;
pub mod value;

pub use backends::PostgresDatabase;
pub use database::{Database, DriverError, Row, TransactionScope};
pub use engine::{
    BoxFuture, Connection, Engine, FindAllOptions, FindOptions, Page, Pagination, TxConnection,
};
pub use error::{OrmError, OrmResult};
pub use instance::Instance;
pub use mapper::{Document, Related};
pub use relationships::{Pivot, RelationshipDescriptor, RelationshipKind};
pub use schema::{Entity, EntityDescriptor, FieldMeta, FieldType, SchemaRegistry};
pub use statement::{CompareOp, Filter, OrderBy, SortDirection, Statement};
pub use value::DbValue;
