//! Result mapper — type-directed value coercion, row decoding, join folding
//!
//! Two directions share one conversion table: caller-supplied JSON payloads
//! are coerced into [`DbValue`]s before binding (failures are the caller's —
//! `Validation`), and driver-returned row values are normalized to the
//! declared field type before instance construction (failures are the
//! driver's — `Database`).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::database::Row;
use crate::error::{OrmError, OrmResult};
use crate::relationships::ResolvedJoin;
use crate::schema::{EntityDescriptor, FieldMeta, FieldType};
use crate::value::DbValue;

/// A caller-supplied write payload: field name to JSON value.
pub type Document = serde_json::Map<String, JsonValue>;

/// Coerce one JSON payload value to the field's declared type.
/// A value the declared type cannot hold is a `Validation` error.
pub fn coerce_field(value: &JsonValue, meta: &FieldMeta) -> OrmResult<DbValue> {
    let raw = json_to_raw(value);
    convert(raw, meta.field_type).map_err(|detail| {
        OrmError::Validation(format!(
            "field '{}' expects {}: {}",
            meta.name, meta.field_type, detail
        ))
    })
}

/// Normalize one driver-returned value to the field's declared type.
/// A value the declared type cannot hold is a `Database` error: the driver
/// returned something the schema says cannot exist.
pub fn decode_field(value: &DbValue, meta: &FieldMeta) -> OrmResult<DbValue> {
    convert(value.clone(), meta.field_type).map_err(|detail| {
        OrmError::Database(format!(
            "column '{}' does not hold a {}: {}",
            meta.name, meta.field_type, detail
        ))
    })
}

fn json_to_raw(value: &JsonValue) -> DbValue {
    match value {
        JsonValue::Null => DbValue::Null,
        JsonValue::Bool(v) => DbValue::Bool(*v),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                DbValue::Int(i)
            } else {
                DbValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(v) => DbValue::Text(v.clone()),
        other => DbValue::Json(other.clone()),
    }
}

/// One conversion table for both directions; errors carry only the detail,
/// callers wrap them with the field name and error kind.
fn convert(raw: DbValue, target: FieldType) -> Result<DbValue, String> {
    if raw.is_null() {
        return Ok(DbValue::Null);
    }
    match target {
        FieldType::Text => match raw {
            DbValue::Text(v) => Ok(DbValue::Text(v)),
            DbValue::Int(v) => Ok(DbValue::Text(v.to_string())),
            DbValue::Float(v) => Ok(DbValue::Text(v.to_string())),
            DbValue::Uuid(v) => Ok(DbValue::Text(v.to_string())),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Integer => match raw {
            DbValue::Int(v) => Ok(DbValue::Int(v)),
            DbValue::Float(v) if v.fract() == 0.0 => Ok(DbValue::Int(v as i64)),
            DbValue::Text(v) => v
                .trim()
                .parse::<i64>()
                .map(DbValue::Int)
                .map_err(|_| format!("'{}' is not an integer", v)),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Float => match raw {
            DbValue::Float(v) => Ok(DbValue::Float(v)),
            DbValue::Int(v) => Ok(DbValue::Float(v as f64)),
            DbValue::Text(v) => v
                .trim()
                .parse::<f64>()
                .map(DbValue::Float)
                .map_err(|_| format!("'{}' is not a number", v)),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Boolean => match raw {
            DbValue::Bool(v) => Ok(DbValue::Bool(v)),
            DbValue::Int(0) => Ok(DbValue::Bool(false)),
            DbValue::Int(1) => Ok(DbValue::Bool(true)),
            DbValue::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(DbValue::Bool(true)),
                "false" | "f" | "0" => Ok(DbValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", v)),
            },
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Date => match raw {
            DbValue::Date(v) => Ok(DbValue::Date(v)),
            DbValue::DateTime(v) => Ok(DbValue::Date(v.date_naive())),
            DbValue::Text(v) => NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .map(DbValue::Date)
                .map_err(|_| format!("'{}' is not a date", v)),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::DateTime => match raw {
            DbValue::DateTime(v) => Ok(DbValue::DateTime(v)),
            DbValue::Date(v) => Ok(DbValue::DateTime(DateTime::from_naive_utc_and_offset(
                v.and_hms_opt(0, 0, 0).unwrap_or_default(),
                Utc,
            ))),
            DbValue::Text(v) => parse_datetime(v.trim())
                .ok_or_else(|| format!("'{}' is not a timestamp", v))
                .map(DbValue::DateTime),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Uuid => match raw {
            DbValue::Uuid(v) => Ok(DbValue::Uuid(v)),
            DbValue::Text(v) => Uuid::parse_str(v.trim())
                .map(DbValue::Uuid)
                .map_err(|_| format!("'{}' is not a uuid", v)),
            other => Err(format!("got {:?}", other)),
        },
        FieldType::Json => match raw {
            DbValue::Json(v) => Ok(DbValue::Json(v)),
            other => Ok(DbValue::Json(other.to_json())),
        },
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    // driver-style timestamps without a zone are taken as UTC
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Decode the declared fields out of a raw row, in declaration order.
/// Columns the descriptor does not declare are ignored.
pub fn decode_row(descriptor: &EntityDescriptor, row: &Row) -> OrmResult<Vec<(String, DbValue)>> {
    descriptor
        .fields
        .iter()
        .filter_map(|meta| {
            row.get(&meta.name)
                .map(|value| decode_field(value, meta).map(|decoded| (meta.name.clone(), decoded)))
        })
        .collect()
}

/// A loaded relationship result, keyed by the relationship's result key.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// belongs-to / has-one: zero or one nested row.
    One(Option<Row>),
    /// has-many / many-to-many: zero or more nested rows.
    Many(Vec<Row>),
}

/// One parent entity folded out of flat joined rows.
#[derive(Debug, Clone)]
pub struct FoldedRow {
    pub values: Vec<(String, DbValue)>,
    pub related: HashMap<String, Related>,
}

/// Fold flat joined rows into one entry per distinct parent.
///
/// Grouping is strictly by the parent's primary-key value, never a composite,
/// so duplicate parent rows produced by collection joins collapse correctly;
/// first-seen order is preserved. Children within each collection are
/// deduplicated by the target's primary-key value, so two collection
/// relationships requested together cross-multiply in SQL but re-fold
/// without duplicate children.
pub fn fold_rows(
    descriptor: &EntityDescriptor,
    joins: &[ResolvedJoin],
    rows: &[Row],
) -> OrmResult<Vec<FoldedRow>> {
    let mut parents: Vec<(DbValue, FoldedRow)> = Vec::new();

    for row in rows {
        let pk = decode_field(
            row.get(&descriptor.primary_key).unwrap_or(&DbValue::Null),
            descriptor
                .primary_key_field()
                .expect("descriptor validated"),
        )?;

        let position = parents.iter().position(|(key, _)| *key == pk);
        let index = match position {
            Some(index) => index,
            None => {
                let mut related = HashMap::new();
                for join in joins {
                    let initial = if join.relationship.kind.is_collection() {
                        Related::Many(Vec::new())
                    } else {
                        Related::One(None)
                    };
                    related.insert(join.alias().to_string(), initial);
                }
                parents.push((
                    pk,
                    FoldedRow {
                        values: decode_row(descriptor, row)?,
                        related,
                    },
                ));
                parents.len() - 1
            }
        };

        for join in joins {
            let Some(child) = extract_child(join, row)? else {
                continue;
            };
            let slot = parents[index]
                .1
                .related
                .get_mut(join.alias())
                .expect("slot initialized with parent");
            match slot {
                Related::One(existing) => {
                    if existing.is_none() {
                        *existing = Some(child);
                    }
                }
                Related::Many(children) => {
                    let child_pk = child.get(&join.target.primary_key);
                    let duplicate = children.iter().any(|seen| match child_pk {
                        Some(pk) if !pk.is_null() => seen.get(&join.target.primary_key) == Some(pk),
                        _ => *seen == child,
                    });
                    if !duplicate {
                        children.push(child);
                    }
                }
            }
        }
    }

    Ok(parents.into_iter().map(|(_, folded)| folded).collect())
}

/// Pull one joined child out of a flat row by its `alias__column` labels.
/// A null child primary key means the LEFT JOIN found nothing.
fn extract_child(join: &ResolvedJoin, row: &Row) -> OrmResult<Option<Row>> {
    let alias = join.alias();
    let pk_label = format!("{}__{}", alias, join.target.primary_key);
    match row.get(&pk_label) {
        None | Some(DbValue::Null) => return Ok(None),
        Some(_) => {}
    }

    let mut columns = Vec::with_capacity(join.target.fields.len());
    for meta in &join.target.fields {
        let label = format!("{}__{}", alias, meta.name);
        if let Some(value) = row.get(&label) {
            columns.push((meta.name.clone(), decode_field(value, meta)?));
        }
    }
    Ok(Some(Row::new(columns)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{resolve_includes, RelationshipDescriptor};
    use crate::schema::{Entity, SchemaRegistry};

    #[test]
    fn coercion_normalizes_textual_scalars() {
        let int_meta = FieldMeta::new("id", FieldType::Integer);
        assert_eq!(
            coerce_field(&serde_json::json!("42"), &int_meta).unwrap(),
            DbValue::Int(42)
        );

        let bool_meta = FieldMeta::new("active", FieldType::Boolean);
        assert_eq!(
            coerce_field(&serde_json::json!("t"), &bool_meta).unwrap(),
            DbValue::Bool(true)
        );
        assert_eq!(
            coerce_field(&serde_json::json!(0), &bool_meta).unwrap(),
            DbValue::Bool(false)
        );

        let ts_meta = FieldMeta::new("seen_at", FieldType::DateTime);
        let coerced = coerce_field(&serde_json::json!("2026-03-01T10:00:00Z"), &ts_meta).unwrap();
        assert!(matches!(coerced, DbValue::DateTime(_)));
    }

    #[test]
    fn incoercible_payload_value_is_validation_error() {
        let meta = FieldMeta::new("id", FieldType::Integer);
        let err = coerce_field(&serde_json::json!("not a number"), &meta).unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }

    #[test]
    fn driver_side_failure_is_database_error() {
        let meta = FieldMeta::new("id", FieldType::Integer);
        let err = decode_field(&DbValue::Text("garbage".into()), &meta).unwrap_err();
        assert!(matches!(err, OrmError::Database(_)));
    }

    #[test]
    fn null_passes_through_every_type() {
        for field_type in [FieldType::Integer, FieldType::Boolean, FieldType::DateTime] {
            let meta = FieldMeta::new("x", field_type);
            assert_eq!(coerce_field(&JsonValue::Null, &meta).unwrap(), DbValue::Null);
        }
    }

    #[test]
    fn decode_row_keeps_declaration_order_and_drops_unknown_columns() {
        let descriptor = EntityDescriptor::new("meter", "id")
            .with_field(FieldMeta::new("id", FieldType::Integer))
            .with_field(FieldMeta::new("name", FieldType::Text))
            .validate()
            .unwrap();
        let row = Row::new(vec![
            ("name".to_string(), DbValue::Text("M1".into())),
            ("id".to_string(), DbValue::Text("7".into())),
            ("stray".to_string(), DbValue::Bool(true)),
        ]);
        let decoded = decode_row(&descriptor, &row).unwrap();
        assert_eq!(
            decoded,
            vec![
                ("id".to_string(), DbValue::Int(7)),
                ("name".to_string(), DbValue::Text("M1".into())),
            ]
        );
    }

    struct Reading;

    impl Entity for Reading {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("readings", "id")
                .with_field(FieldMeta::new("id", FieldType::Integer))
                .with_field(FieldMeta::new("value", FieldType::Float))
        }
    }

    struct Tag;

    impl Entity for Tag {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("tags", "id")
                .with_field(FieldMeta::new("id", FieldType::Integer))
                .with_field(FieldMeta::new("label", FieldType::Text))
        }
    }

    fn meter_with_collections() -> (EntityDescriptor, SchemaRegistry) {
        let descriptor = EntityDescriptor::new("meter", "id")
            .with_field(FieldMeta::new("id", FieldType::Integer))
            .with_field(FieldMeta::new("name", FieldType::Text))
            .with_relationship(RelationshipDescriptor::has_many(
                "readings", "readings", "meter_id",
            ))
            .with_relationship(RelationshipDescriptor::has_many("tags", "tags", "meter_id"))
            .validate()
            .unwrap();
        let registry = SchemaRegistry::new();
        registry.descriptor::<Reading>().unwrap();
        registry.descriptor::<Tag>().unwrap();
        (descriptor, registry)
    }

    fn joined_row(meter_id: i64, reading: Option<i64>, tag: Option<i64>) -> Row {
        Row::new(vec![
            ("id".to_string(), DbValue::Int(meter_id)),
            ("name".to_string(), DbValue::Text(format!("M{}", meter_id))),
            (
                "readings__id".to_string(),
                reading.map_or(DbValue::Null, DbValue::Int),
            ),
            (
                "readings__value".to_string(),
                reading.map_or(DbValue::Null, |r| DbValue::Float(r as f64)),
            ),
            (
                "tags__id".to_string(),
                tag.map_or(DbValue::Null, DbValue::Int),
            ),
            (
                "tags__label".to_string(),
                tag.map_or(DbValue::Null, |t| DbValue::Text(format!("tag-{}", t))),
            ),
        ])
    }

    #[test]
    fn has_many_rows_fold_by_parent_primary_key() {
        let (descriptor, registry) = meter_with_collections();
        let joins = resolve_includes(&descriptor, &registry, &["readings".to_string()]).unwrap();

        // 5 joined rows, 2 distinct parents: 3 children + 2 children
        let rows = vec![
            joined_row(1, Some(10), None),
            joined_row(1, Some(11), None),
            joined_row(1, Some(12), None),
            joined_row(2, Some(20), None),
            joined_row(2, Some(21), None),
        ];
        let folded = fold_rows(&descriptor, &joins, &rows).unwrap();
        assert_eq!(folded.len(), 2);
        let children = |i: usize| match &folded[i].related["readings"] {
            Related::Many(rows) => rows.len(),
            Related::One(_) => panic!("has_many folds to Many"),
        };
        assert_eq!(children(0), 3);
        assert_eq!(children(1), 2);
    }

    #[test]
    fn two_collections_refold_without_duplicate_children() {
        let (descriptor, registry) = meter_with_collections();
        let joins = resolve_includes(
            &descriptor,
            &registry,
            &["readings".to_string(), "tags".to_string()],
        )
        .unwrap();

        // cross product of 2 readings x 2 tags for one parent
        let rows = vec![
            joined_row(1, Some(10), Some(100)),
            joined_row(1, Some(10), Some(101)),
            joined_row(1, Some(11), Some(100)),
            joined_row(1, Some(11), Some(101)),
        ];
        let folded = fold_rows(&descriptor, &joins, &rows).unwrap();
        assert_eq!(folded.len(), 1);
        match (&folded[0].related["readings"], &folded[0].related["tags"]) {
            (Related::Many(readings), Related::Many(tags)) => {
                assert_eq!(readings.len(), 2);
                assert_eq!(tags.len(), 2);
            }
            _ => panic!("collections fold to Many"),
        }
    }

    #[test]
    fn left_join_miss_folds_to_empty() {
        let (descriptor, registry) = meter_with_collections();
        let joins = resolve_includes(&descriptor, &registry, &["readings".to_string()]).unwrap();
        let rows = vec![joined_row(1, None, None)];
        let folded = fold_rows(&descriptor, &joins, &rows).unwrap();
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].related["readings"], Related::Many(Vec::new()));
    }
}
