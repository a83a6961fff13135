//! UPDATE and DELETE construction
//!
//! Both verbs require a non-empty filter. An empty filter is rejected before
//! any SQL exists, never interpreted as "all rows".

use chrono::{DateTime, Utc};

use crate::error::{OrmError, OrmResult};
use crate::mapper::{coerce_field, Document};
use crate::schema::EntityDescriptor;
use crate::value::DbValue;

use super::conditions::Filter;
use super::Statement;

fn require_filter(filter: &Filter, verb: &str, table: &str) -> OrmResult<()> {
    if filter.is_empty() {
        return Err(OrmError::Validation(format!(
            "refusing to {} '{}' without conditions",
            verb, table
        )));
    }
    Ok(())
}

/// Build an UPDATE whose SET clause covers the payload keys that are
/// declared fields, excluding the primary key, in declaration order.
/// `RETURNING *` carries the refreshed row back. When `now` is given and the
/// descriptor manages timestamps, `updated_at` is set unless the payload
/// already carries it.
pub fn build_update(
    descriptor: &EntityDescriptor,
    data: &Document,
    filter: &Filter,
    now: Option<DateTime<Utc>>,
) -> OrmResult<Statement> {
    require_filter(filter, "update", &descriptor.table)?;

    let mut assignments: Vec<String> = Vec::new();
    let mut params: Vec<DbValue> = Vec::new();
    let mut counter = 1;

    for meta in &descriptor.fields {
        if meta.name == descriptor.primary_key {
            continue;
        }
        let value = match data.get(&meta.name) {
            Some(value) => Some(coerce_field(value, meta)?),
            None if descriptor.timestamps && meta.name == "updated_at" => {
                now.map(DbValue::DateTime)
            }
            None => None,
        };
        if let Some(value) = value {
            assignments.push(format!("{} = ${}", meta.name, counter));
            params.push(value);
            counter += 1;
        }
    }

    if assignments.is_empty() {
        return Err(OrmError::Validation(format!(
            "update of '{}' carries no updatable fields",
            descriptor.table
        )));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        descriptor.table,
        assignments.join(", ")
    );
    filter.render(&mut sql, &mut params, &mut counter, None)?;
    sql.push_str(" RETURNING *");
    Ok(Statement::new(sql, params))
}

/// Build a DELETE with the same mandatory-filter guard as UPDATE.
/// `RETURNING *` carries the deleted-row snapshot back.
pub fn build_delete(descriptor: &EntityDescriptor, filter: &Filter) -> OrmResult<Statement> {
    require_filter(filter, "delete from", &descriptor.table)?;

    let mut sql = format!("DELETE FROM {}", descriptor.table);
    let mut params = Vec::new();
    let mut counter = 1;
    filter.render(&mut sql, &mut params, &mut counter, None)?;
    sql.push_str(" RETURNING *");
    Ok(Statement::new(sql, params))
}
