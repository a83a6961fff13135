//! SELECT and COUNT construction

use crate::error::OrmResult;
use crate::relationships::ResolvedJoin;
use crate::schema::EntityDescriptor;
use crate::value::DbValue;

use super::conditions::{Filter, OrderBy};
use super::Statement;

/// Everything a SELECT can carry besides the table itself.
#[derive(Debug, Clone, Copy)]
pub struct SelectParts<'a> {
    pub filter: &'a Filter,
    pub order: &'a [OrderBy],
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub joins: &'a [ResolvedJoin],
}

impl<'a> SelectParts<'a> {
    pub fn filtered(filter: &'a Filter) -> Self {
        static EMPTY_ORDER: [OrderBy; 0] = [];
        static EMPTY_JOINS: [ResolvedJoin; 0] = [];
        Self {
            filter,
            order: &EMPTY_ORDER,
            limit: None,
            offset: None,
            joins: &EMPTY_JOINS,
        }
    }
}

/// Build a SELECT with a deterministic column list.
///
/// Without joins, columns are the declared fields, unqualified. With joins,
/// base columns are qualified by the table name (avoiding collisions with
/// joined tables) and each joined column is labeled `alias__column` for the
/// fold; filter and order columns are qualified the same way. ORDER BY comes
/// before LIMIT/OFFSET, which are always appended last.
pub fn build_select(descriptor: &EntityDescriptor, parts: SelectParts<'_>) -> OrmResult<Statement> {
    let joined = !parts.joins.is_empty();
    let qualify = joined.then_some(descriptor.table.as_str());

    let mut columns: Vec<String> = descriptor
        .fields
        .iter()
        .map(|f| match qualify {
            Some(table) => format!("{}.{}", table, f.name),
            None => f.name.clone(),
        })
        .collect();
    for join in parts.joins {
        columns.extend(join.select_columns());
    }

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), descriptor.table);
    for join in parts.joins {
        for clause in join.join_clauses(descriptor) {
            sql.push(' ');
            sql.push_str(&clause);
        }
    }

    let mut params = Vec::new();
    let mut counter = 1;
    parts.filter.render(&mut sql, &mut params, &mut counter, qualify)?;

    if !parts.order.is_empty() {
        let entries: Vec<String> = parts
            .order
            .iter()
            .map(|entry| {
                let column = match qualify {
                    Some(table) if !entry.column.contains('.') => {
                        format!("{}.{}", table, entry.column)
                    }
                    _ => entry.column.clone(),
                };
                format!("{} {}", column, entry.direction)
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", entries.join(", ")));
    }

    if let Some(limit) = parts.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = parts.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(Statement::new(sql, params))
}

/// Build the companion COUNT for pagination metadata, sharing the filter
/// rendering with [`build_select`].
pub fn build_count(descriptor: &EntityDescriptor, filter: &Filter) -> OrmResult<Statement> {
    let mut sql = format!("SELECT COUNT(*) AS count FROM {}", descriptor.table);
    let mut params = Vec::new();
    let mut counter = 1;
    filter.render(&mut sql, &mut params, &mut counter, None)?;
    Ok(Statement::new(sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{resolve_includes, RelationshipDescriptor};
    use crate::schema::{Entity, FieldMeta, FieldType, SchemaRegistry};
    use crate::statement::conditions::SortDirection;

    fn meter() -> EntityDescriptor {
        EntityDescriptor::new("meter", "id")
            .with_field(FieldMeta::new("id", FieldType::Integer))
            .with_field(FieldMeta::new("name", FieldType::Text))
            .with_field(FieldMeta::new("status", FieldType::Text))
            .with_relationship(RelationshipDescriptor::has_many(
                "readings", "readings", "meter_id",
            ))
            .validate()
            .unwrap()
    }

    #[test]
    fn plain_select_lists_declared_fields() {
        let filter = Filter::new();
        let stmt = build_select(&meter(), SelectParts::filtered(&filter)).unwrap();
        assert_eq!(stmt.sql, "SELECT id, name, status FROM meter");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn clause_order_is_where_order_limit_offset() {
        let filter = Filter::new().eq("status", "active");
        let order = [OrderBy::desc("name")];
        let stmt = build_select(
            &meter(),
            SelectParts {
                filter: &filter,
                order: &order,
                limit: Some(10),
                offset: Some(20),
                joins: &[],
            },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT id, name, status FROM meter WHERE status = $1 ORDER BY name DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![DbValue::Text("active".into())]);
    }

    #[test]
    fn joined_select_qualifies_and_labels_columns() {
        struct Reading;
        impl Entity for Reading {
            fn descriptor() -> EntityDescriptor {
                EntityDescriptor::new("readings", "id")
                    .with_field(FieldMeta::new("id", FieldType::Integer))
                    .with_field(FieldMeta::new("value", FieldType::Float))
            }
        }
        let registry = SchemaRegistry::new();
        registry.descriptor::<Reading>().unwrap();
        let descriptor = meter();
        let joins = resolve_includes(&descriptor, &registry, &["readings".to_string()]).unwrap();

        let filter = Filter::new().eq("status", "active");
        let order = [OrderBy {
            column: "id".to_string(),
            direction: SortDirection::Asc,
        }];
        let stmt = build_select(
            &descriptor,
            SelectParts {
                filter: &filter,
                order: &order,
                limit: None,
                offset: None,
                joins: &joins,
            },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT meter.id, meter.name, meter.status, \
             readings.id AS \"readings__id\", readings.value AS \"readings__value\" \
             FROM meter \
             LEFT JOIN readings AS readings ON readings.meter_id = meter.id \
             WHERE meter.status = $1 ORDER BY meter.id ASC"
        );
    }

    #[test]
    fn count_shares_filter_rendering() {
        let filter = Filter::new().eq("status", "active");
        let stmt = build_count(&meter(), &filter).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) AS count FROM meter WHERE status = $1"
        );
        assert_eq!(stmt.params, vec![DbValue::Text("active".into())]);
    }
}
