//! Relationship descriptors — configuration for how entity types join

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// The kind of relationship between two entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// The foreign key lives on this entity and points at the target.
    BelongsTo,
    /// One target row carries a foreign key back to this entity.
    HasOne,
    /// Many target rows carry a foreign key back to this entity.
    HasMany,
    /// Linked through a pivot table.
    ManyToMany,
}

impl RelationshipKind {
    /// True when the relationship folds to a collection rather than a
    /// single nested object.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }

    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Pivot table configuration for many-to-many relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub table: String,
    /// Pivot column referencing the declaring entity.
    pub local_column: String,
    /// Pivot column referencing the target entity.
    pub related_column: String,
}

impl Pivot {
    pub fn new(
        table: impl Into<String>,
        local_column: impl Into<String>,
        related_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            local_column: local_column.into(),
            related_column: related_column.into(),
        }
    }

    fn validate(&self, owner: &str, name: &str) -> OrmResult<()> {
        if self.table.is_empty() || self.local_column.is_empty() || self.related_column.is_empty() {
            return Err(OrmError::Configuration(format!(
                "relationship '{}' on '{}' has an incomplete pivot configuration",
                name, owner
            )));
        }
        if self.local_column == self.related_column {
            return Err(OrmError::Configuration(format!(
                "relationship '{}' on '{}' uses the same pivot column for both sides",
                name, owner
            )));
        }
        Ok(())
    }
}

/// Configuration describing how one entity type joins to another.
///
/// Join semantics per kind:
/// - `BelongsTo`: `base.foreign_key = target.target_key` (target key
///   defaults to the target's primary key),
/// - `HasOne`/`HasMany`: `target.foreign_key = base.target_key` (defaults
///   to the declaring entity's primary key),
/// - `ManyToMany`: `pivot.local_column = base.primary_key` and
///   `target.target_key = pivot.related_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub kind: RelationshipKind,
    /// Name callers use in include lists.
    pub name: String,
    pub target_table: String,
    pub foreign_key: String,
    /// Overrides the defaulted key on the non-foreign-key side.
    pub target_key: Option<String>,
    /// Required for (and only for) many-to-many.
    pub pivot: Option<Pivot>,
    /// Key under which the nested result is attached; defaults to `name`.
    pub alias: Option<String>,
}

impl RelationshipDescriptor {
    fn new(
        kind: RelationshipKind,
        name: impl Into<String>,
        target_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            target_table: target_table.into(),
            foreign_key: foreign_key.into(),
            target_key: None,
            pivot: None,
            alias: None,
        }
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipKind::BelongsTo, name, target_table, foreign_key)
    }

    pub fn has_one(
        name: impl Into<String>,
        target_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipKind::HasOne, name, target_table, foreign_key)
    }

    pub fn has_many(
        name: impl Into<String>,
        target_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipKind::HasMany, name, target_table, foreign_key)
    }

    pub fn many_to_many(
        name: impl Into<String>,
        target_table: impl Into<String>,
        pivot: Pivot,
    ) -> Self {
        let mut rel = Self::new(RelationshipKind::ManyToMany, name, target_table, "");
        rel.pivot = Some(pivot);
        rel
    }

    pub fn with_target_key(mut self, target_key: impl Into<String>) -> Self {
        self.target_key = Some(target_key.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The key the nested result is attached under.
    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn validate(&self, owner: &str) -> OrmResult<()> {
        if self.name.is_empty() {
            return Err(OrmError::Configuration(format!(
                "entity '{}' declares a relationship with an empty name",
                owner
            )));
        }
        if self.target_table.is_empty() {
            return Err(OrmError::Configuration(format!(
                "relationship '{}' on '{}' is missing a target table",
                self.name, owner
            )));
        }
        match (self.kind.requires_pivot(), &self.pivot) {
            (true, None) => Err(OrmError::Configuration(format!(
                "relationship '{}' on '{}' is many-to-many and requires a pivot table",
                self.name, owner
            ))),
            (false, Some(_)) => Err(OrmError::Configuration(format!(
                "relationship '{}' on '{}' declares a pivot table but is not many-to-many",
                self.name, owner
            ))),
            (true, Some(pivot)) => pivot.validate(owner, &self.name),
            (false, None) => {
                if self.foreign_key.is_empty() {
                    Err(OrmError::Configuration(format!(
                        "relationship '{}' on '{}' is missing a foreign key",
                        self.name, owner
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}
