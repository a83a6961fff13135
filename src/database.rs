//! The consumed database capability
//!
//! The engine does not own a pool or a driver. It consumes this small
//! contract from its host environment: one parameterized statement at a time
//! via [`Database::query`]/[`Database::execute`], and multi-statement
//! atomicity via [`Database::begin`]. Concrete bindings live under
//! `backends`; tests substitute scripted implementations.

use async_trait::async_trait;

use crate::value::DbValue;

/// A structured driver failure, as reported by a [`Database`] implementation.
///
/// Implementations fill in whatever the underlying driver exposes; the error
/// translator keys off the SQLSTATE `code` and never inspects `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    /// Five-character SQLSTATE code, when the driver reports one.
    pub code: Option<String>,
    pub message: String,
    /// Violated constraint name, for integrity errors.
    pub constraint: Option<String>,
    /// Table involved in the failure, when known.
    pub table: Option<String>,
}

impl DriverError {
    /// A failure with no SQLSTATE, e.g. a connection-level error.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            constraint: None,
            table: None,
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// One result row: column name/value pairs in the order the statement
/// selected them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, DbValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, DbValue)>) -> Self {
        Self { columns }
    }

    /// Value of the named column, if present.
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    /// Value at the given ordinal.
    pub fn get_index(&self, index: usize) -> Option<&DbValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate columns in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DbValue)> {
        self.columns.iter().map(|(col, value)| (col.as_str(), value))
    }
}

impl FromIterator<(String, DbValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, DbValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// The opaque query capability the engine runs statements through.
///
/// Physical connection management, timeouts, and cancellation belong to the
/// implementation; the engine only propagates their failures.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute one parameterized statement and return its result rows.
    async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>, DriverError>;

    /// Execute one parameterized statement and return the affected-row count.
    async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DriverError>;

    /// Begin a transaction and return its scoped capability.
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError>;
}

/// The scoped capability inside one transaction.
///
/// Statements issued through the `Database` methods of this object are part
/// of one atomic unit; dropping the scope without [`TransactionScope::commit`]
/// must roll the unit back.
#[async_trait]
pub trait TransactionScope: Database {
    /// Borrow this scope as the plain query capability.
    fn as_database(&self) -> &dyn Database;

    async fn commit(self: Box<Self>) -> Result<(), DriverError>;

    async fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}
