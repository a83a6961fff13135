//! INSERT construction

use chrono::{DateTime, Utc};

use crate::error::{OrmError, OrmResult};
use crate::mapper::{coerce_field, Document};
use crate::schema::EntityDescriptor;
use crate::value::DbValue;

use super::Statement;

/// Build an INSERT for the intersection of declared fields and payload keys,
/// in declaration order, with `RETURNING *` so the created row (including
/// generated keys and defaults) comes back in one round trip.
///
/// Unknown payload keys are silently dropped; a declared required field
/// missing from the payload is a `Validation` error. When `now` is given and
/// the descriptor manages timestamps, `created_at`/`updated_at` are bound
/// unless the payload already carries them.
pub fn build_insert(
    descriptor: &EntityDescriptor,
    data: &Document,
    now: Option<DateTime<Utc>>,
) -> OrmResult<Statement> {
    let mut columns: Vec<&str> = Vec::new();
    let mut params: Vec<DbValue> = Vec::new();

    for meta in &descriptor.fields {
        match data.get(&meta.name) {
            Some(value) => {
                columns.push(&meta.name);
                params.push(coerce_field(value, meta)?);
            }
            None => {
                if descriptor.timestamps
                    && (meta.name == "created_at" || meta.name == "updated_at")
                {
                    if let Some(now) = now {
                        columns.push(&meta.name);
                        params.push(DbValue::DateTime(now));
                    }
                } else if meta.required {
                    return Err(OrmError::Validation(format!(
                        "required field '{}' is missing from the create payload",
                        meta.name
                    )));
                }
            }
        }
    }

    if columns.is_empty() {
        return Ok(Statement::new(
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", descriptor.table),
            Vec::new(),
        ));
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        descriptor.table,
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(Statement::new(sql, params))
}
