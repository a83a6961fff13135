//! Include resolution — turning relationship configuration into JOIN clauses
//!
//! Resolution order follows the entity's declaration order, not the caller's
//! include order, so generated SQL is deterministic and cacheable by text.
//! Joined columns are selected under a `alias__column` label; the mapper
//! peels that prefix off when folding rows back into nested objects.

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::schema::{EntityDescriptor, SchemaRegistry};

use super::descriptor::{RelationshipDescriptor, RelationshipKind};

/// One requested relationship, resolved against the registry.
#[derive(Debug, Clone)]
pub struct ResolvedJoin {
    pub relationship: RelationshipDescriptor,
    /// Descriptor of the target table, used to enumerate its columns.
    pub target: Arc<EntityDescriptor>,
}

impl ResolvedJoin {
    /// Alias the target table is joined under and nested results are keyed by.
    pub fn alias(&self) -> &str {
        self.relationship.result_key()
    }

    /// Select-list entries for the joined columns, labeled `alias__column`.
    pub fn select_columns(&self) -> Vec<String> {
        let alias = self.alias();
        self.target
            .fields
            .iter()
            .map(|f| format!("{}.{} AS \"{}__{}\"", alias, f.name, alias, f.name))
            .collect()
    }

    /// LEFT JOIN clauses for this relationship (two for many-to-many).
    pub fn join_clauses(&self, base: &EntityDescriptor) -> Vec<String> {
        let rel = &self.relationship;
        let alias = self.alias();
        match rel.kind {
            RelationshipKind::BelongsTo => {
                let target_key = rel.target_key.as_deref().unwrap_or(&self.target.primary_key);
                vec![format!(
                    "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                    self.target.table, alias, base.table, rel.foreign_key, alias, target_key
                )]
            }
            RelationshipKind::HasOne | RelationshipKind::HasMany => {
                let base_key = rel.target_key.as_deref().unwrap_or(&base.primary_key);
                vec![format!(
                    "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                    self.target.table, alias, alias, rel.foreign_key, base.table, base_key
                )]
            }
            RelationshipKind::ManyToMany => {
                // validated: many-to-many always carries a pivot
                let pivot = rel.pivot.as_ref().expect("validated pivot");
                let pivot_alias = format!("{}_via", alias);
                let target_key = rel.target_key.as_deref().unwrap_or(&self.target.primary_key);
                vec![
                    format!(
                        "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                        pivot.table,
                        pivot_alias,
                        pivot_alias,
                        pivot.local_column,
                        base.table,
                        base.primary_key
                    ),
                    format!(
                        "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                        self.target.table,
                        alias,
                        alias,
                        target_key,
                        pivot_alias,
                        pivot.related_column
                    ),
                ]
            }
        }
    }
}

/// Resolve an include list against the entity's declared relationships.
///
/// Unknown include names are a caller defect (`Validation`); a target table
/// with no registered descriptor is a setup defect (`Configuration`) since
/// its join columns cannot be enumerated.
pub fn resolve_includes(
    base: &EntityDescriptor,
    registry: &SchemaRegistry,
    include: &[String],
) -> OrmResult<Vec<ResolvedJoin>> {
    if include.is_empty() {
        return Ok(Vec::new());
    }

    for name in include {
        if base.relationship(name).is_none() {
            return Err(OrmError::Validation(format!(
                "unknown relationship '{}' on entity '{}'",
                name, base.table
            )));
        }
    }

    base.relationships
        .iter()
        .filter(|rel| include.iter().any(|name| name == &rel.name))
        .map(|rel| {
            let target = registry.descriptor_for_table(&rel.target_table).ok_or_else(|| {
                OrmError::Configuration(format!(
                    "relationship '{}' on '{}' targets unregistered table '{}'",
                    rel.name, base.table, rel.target_table
                ))
            })?;
            Ok(ResolvedJoin {
                relationship: rel.clone(),
                target,
            })
        })
        .collect()
}
