//! Filter and ordering types, and their parameterized WHERE rendering

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::value::DbValue;

/// Comparison operators supported in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sql = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::In => "IN",
            CompareOp::NotIn => "NOT IN",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", sql)
    }
}

/// One WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: CompareOp,
    /// Bound value for scalar operators; unused for null checks.
    pub value: Option<DbValue>,
    /// Bound values for IN / NOT IN.
    pub values: Vec<DbValue>,
}

/// A conjunction of conditions. Conditions are always ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_scalar(mut self, column: &str, operator: CompareOp, value: impl Into<DbValue>) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator,
            value: Some(value.into()),
            values: Vec::new(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Eq, value)
    }

    pub fn ne(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Ne, value)
    }

    pub fn gt(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Gte, value)
    }

    pub fn lt(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Into<DbValue>) -> Self {
        self.push_scalar(column, CompareOp::Lte, value)
    }

    pub fn like(self, column: &str, pattern: &str) -> Self {
        self.push_scalar(column, CompareOp::Like, pattern)
    }

    pub fn not_like(self, column: &str, pattern: &str) -> Self {
        self.push_scalar(column, CompareOp::NotLike, pattern)
    }

    pub fn is_in<V: Into<DbValue>>(mut self, column: &str, values: Vec<V>) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: CompareOp::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn not_in<V: Into<DbValue>>(mut self, column: &str, values: Vec<V>) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: CompareOp::NotIn,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: CompareOp::IsNull,
            value: None,
            values: Vec::new(),
        });
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: CompareOp::IsNotNull,
            value: None,
            values: Vec::new(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Append ` WHERE ...` to `sql`, binding values into `params` starting
    /// at `*counter`. Columns are prefixed with `qualify` when given and not
    /// already qualified. No-op for an empty filter.
    pub(crate) fn render(
        &self,
        sql: &mut String,
        params: &mut Vec<DbValue>,
        counter: &mut usize,
        qualify: Option<&str>,
    ) -> OrmResult<()> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            let column = match qualify {
                Some(table) if !condition.column.contains('.') => {
                    format!("{}.{}", table, condition.column)
                }
                _ => condition.column.clone(),
            };
            match condition.operator {
                CompareOp::IsNull | CompareOp::IsNotNull => {
                    sql.push_str(&format!("{} {}", column, condition.operator));
                }
                CompareOp::In | CompareOp::NotIn => {
                    if condition.values.is_empty() {
                        return Err(OrmError::Validation(format!(
                            "{} condition on '{}' requires at least one value",
                            condition.operator, condition.column
                        )));
                    }
                    let placeholders: Vec<String> = condition
                        .values
                        .iter()
                        .map(|value| {
                            params.push(value.clone());
                            let placeholder = format!("${}", counter);
                            *counter += 1;
                            placeholder
                        })
                        .collect();
                    sql.push_str(&format!(
                        "{} {} ({})",
                        column,
                        condition.operator,
                        placeholders.join(", ")
                    ));
                }
                _ => {
                    let value = condition.value.clone().ok_or_else(|| {
                        OrmError::Validation(format!(
                            "missing value for '{}' condition on '{}'",
                            condition.operator, condition.column
                        ))
                    })?;
                    sql.push_str(&format!("{} {} ${}", column, condition.operator, counter));
                    params.push(value);
                    *counter += 1;
                }
            }
        }
        Ok(())
    }
}

/// Sort direction for an ORDER BY entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}
