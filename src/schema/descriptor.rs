//! Entity type descriptors — table, primary key, fields, relationships
//!
//! A descriptor is declared once per entity type, validated the first time
//! any verb touches the type, and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::relationships::RelationshipDescriptor;
use crate::schema::field::{FieldMeta, FieldType};

/// Cached metadata for one kind of persisted object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub table: String,
    pub primary_key: String,
    /// Declaration order is authoritative for column lists.
    pub fields: Vec<FieldMeta>,
    /// Declaration order is authoritative for join construction.
    pub relationships: Vec<RelationshipDescriptor>,
    /// When set, `created_at`/`updated_at` are auto-populated on write.
    pub timestamps: bool,
}

impl EntityDescriptor {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
            timestamps: false,
        }
    }

    pub fn with_field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Enable managed `created_at`/`updated_at` timestamps. The two fields
    /// are declared automatically during validation if absent.
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Metadata for the named field.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Metadata for the primary-key field.
    pub fn primary_key_field(&self) -> Option<&FieldMeta> {
        self.field(&self.primary_key)
    }

    /// Relationship declared under the given name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Validate the declaration and return the finalized descriptor.
    ///
    /// Runs exactly once per type (the registry caches the outcome, error
    /// included). Managed timestamp fields are appended here when enabled.
    pub fn validate(mut self) -> OrmResult<Self> {
        if self.table.trim().is_empty() {
            return Err(OrmError::Configuration(
                "entity descriptor is missing a table name".to_string(),
            ));
        }
        if self.primary_key.trim().is_empty() {
            return Err(OrmError::Configuration(format!(
                "entity '{}' is missing a primary key",
                self.table
            )));
        }

        if self.timestamps {
            for name in ["created_at", "updated_at"] {
                if self.field(name).is_none() {
                    self.fields.push(FieldMeta::new(name, FieldType::DateTime));
                }
            }
        }

        if self.primary_key_field().is_none() {
            return Err(OrmError::Configuration(format!(
                "entity '{}' declares primary key '{}' but no such field",
                self.table, self.primary_key
            )));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(OrmError::Configuration(format!(
                    "entity '{}' declares field '{}' more than once",
                    self.table, field.name
                )));
            }
        }

        for (i, rel) in self.relationships.iter().enumerate() {
            rel.validate(&self.table)?;
            if self.relationships[..i].iter().any(|r| r.name == rel.name) {
                return Err(OrmError::Configuration(format!(
                    "entity '{}' declares relationship '{}' more than once",
                    self.table, rel.name
                )));
            }
        }

        Ok(self)
    }
}
