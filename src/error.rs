//! Error types for the model engine
//!
//! The engine exposes a closed taxonomy: every failure a caller can observe
//! is one of the five variants below. Raw driver failures never escape the
//! executor; they are translated from [`DriverError`](crate::database::DriverError)
//! exactly once per call.

use crate::database::DriverError;

/// Result type alias for engine operations
pub type OrmResult<T> = Result<T, OrmError>;

/// The fixed set of error kinds the engine ever raises.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrmError {
    /// Bad entity type setup (missing table name, unknown primary key,
    /// invalid relationship configuration). Fatal for the type; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bad caller input: missing required fields, incoercible values,
    /// empty WHERE on a write, unknown include names.
    #[error("validation error: {0}")]
    Validation(String),

    /// An instance-level operation targeted a primary key with no current
    /// row. `find_by_id`/`find_one` return `None` instead of raising this.
    #[error("record not found in table '{0}'")]
    NotFound(String),

    /// Referential-integrity violation on a write or delete.
    #[error("foreign key violation{}{}", fmt_part(" on constraint ", .constraint), fmt_part(" of table ", .table))]
    ForeignKey {
        constraint: Option<String>,
        table: Option<String>,
    },

    /// Any other database failure. Callers may treat this as retryable.
    #[error("database error: {0}")]
    Database(String),
}

fn fmt_part(prefix: &str, value: &Option<String>) -> String {
    match value {
        Some(v) => format!("{}'{}'", prefix, v),
        None => String::new(),
    }
}

impl OrmError {
    /// Translate a structured driver failure into the taxonomy.
    ///
    /// SQLSTATE 23503 (foreign_key_violation) maps to [`OrmError::ForeignKey`];
    /// everything else, including timeouts and cancellation surfaced by the
    /// capability, maps to [`OrmError::Database`].
    pub fn from_driver(err: DriverError) -> Self {
        match err.code.as_deref() {
            Some("23503") => OrmError::ForeignKey {
                constraint: err.constraint,
                table: err.table,
            },
            _ => OrmError::Database(err.message),
        }
    }

    /// True for errors that indicate a caller/setup defect and must not be
    /// retried by the engine or its callers.
    pub fn is_permanent(&self) -> bool {
        matches!(self, OrmError::Configuration(_) | OrmError::Validation(_))
    }
}
