//! Statement builder — pure SQL + parameter construction
//!
//! Four statement shapes (INSERT, SELECT, UPDATE, DELETE) plus COUNT, each a
//! side-effect-free function from (descriptor, data/filter/options) to a
//! [`Statement`]. Placeholders are `$1..$n` in parameter order.

pub mod conditions;
pub mod insert;
pub mod mutate;
pub mod select;

pub use conditions::{CompareOp, Condition, Filter, OrderBy, SortDirection};
pub use insert::build_insert;
pub use mutate::{build_delete, build_update};
pub use select::{build_count, build_select, SelectParts};

use crate::value::DbValue;

/// A parameterized SQL statement: text plus ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DbValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<DbValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}
