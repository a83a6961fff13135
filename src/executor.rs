//! Query executor — runs statements, logs them, translates failures
//!
//! Every statement the engine issues passes through here exactly once, so
//! the error translator is the single point where driver failures become
//! taxonomy errors, and statement logging has one home.

use tracing::{debug, warn};

use crate::database::{Database, Row};
use crate::error::{OrmError, OrmResult};
use crate::statement::Statement;

/// Run a statement and return its rows.
pub async fn fetch_all(db: &dyn Database, stmt: &Statement) -> OrmResult<Vec<Row>> {
    debug!(sql = %stmt.sql, params = ?stmt.params, "executing statement");
    db.query(&stmt.sql, &stmt.params).await.map_err(|err| {
        warn!(sql = %stmt.sql, error = %err, "statement failed");
        OrmError::from_driver(err)
    })
}

/// Run a statement and return its single row, or `None`.
pub async fn fetch_optional(db: &dyn Database, stmt: &Statement) -> OrmResult<Option<Row>> {
    let mut rows = fetch_all(db, stmt).await?;
    if rows.len() > 1 {
        debug!(sql = %stmt.sql, count = rows.len(), "expected at most one row");
    }
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DriverError, TransactionScope};
    use crate::value::DbValue;
    use async_trait::async_trait;

    struct FailingDb(DriverError);

    #[async_trait]
    impl Database for FailingDb {
        async fn query(&self, _sql: &str, _params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
            Err(self.0.clone())
        }

        async fn execute(&self, _sql: &str, _params: &[DbValue]) -> Result<u64, DriverError> {
            Err(self.0.clone())
        }

        async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
            Err(self.0.clone())
        }
    }

    #[tokio::test]
    async fn failures_are_translated_not_passed_through() {
        let db = FailingDb(DriverError {
            code: Some("23503".to_string()),
            message: "violates".to_string(),
            constraint: Some("fk_site".to_string()),
            table: Some("meter".to_string()),
        });
        let stmt = Statement::new("DELETE FROM meter WHERE id = $1", vec![DbValue::Int(1)]);
        let err = fetch_all(&db, &stmt).await.unwrap_err();
        assert!(matches!(err, OrmError::ForeignKey { .. }));

        let db = FailingDb(DriverError::message("socket closed"));
        let err = fetch_all(&db, &stmt).await.unwrap_err();
        assert_eq!(err, OrmError::Database("socket closed".to_string()));
    }

    struct TwoRowDb;

    #[async_trait]
    impl Database for TwoRowDb {
        async fn query(&self, _sql: &str, _params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
            Ok(vec![
                Row::new(vec![("id".to_string(), DbValue::Int(1))]),
                Row::new(vec![("id".to_string(), DbValue::Int(2))]),
            ])
        }

        async fn execute(&self, _sql: &str, _params: &[DbValue]) -> Result<u64, DriverError> {
            Ok(0)
        }

        async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
            Err(DriverError::message("no transactions"))
        }
    }

    #[tokio::test]
    async fn fetch_optional_takes_the_first_row() {
        let stmt = Statement::new("SELECT id FROM meter", Vec::new());
        let row = fetch_optional(&TwoRowDb, &stmt).await.unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&DbValue::Int(1)));
    }
}
