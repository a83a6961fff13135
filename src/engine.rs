//! Engine — verbs, pagination, and transactions
//!
//! [`Engine`] glues the capability, the registry, and the statement builders
//! together. All verbs live on the [`Connection`] trait so they run
//! identically against the pooled capability and against a transaction
//! scope; [`Engine::transaction`] hands the callback a [`TxConnection`] and
//! commits on `Ok`, rolls back on `Err`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::executor;
use crate::instance::Instance;
use crate::mapper::{fold_rows, Document};
use crate::relationships::resolve_includes;
use crate::schema::{Entity, SchemaRegistry};
use crate::statement::{build_count, build_insert, build_select, Filter, OrderBy, SelectParts};
use crate::value::DbValue;

/// Boxed future alias for the transaction callback.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Options for single-row lookups.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Relationship names to load alongside the row.
    pub include: Vec<String>,
}

impl FindOptions {
    pub fn with_include(names: &[&str]) -> Self {
        Self {
            include: names.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Options for multi-row queries.
///
/// `limit`/`offset` window the flat SQL rows. Combined with a collection
/// include, where one parent spans several joined rows, a window can fold to
/// fewer parents than `limit` and can cut a parent's collection short at the
/// window edge; the companion COUNT still totals parents. Window
/// single-valued includes freely; fetch collection includes unwindowed.
#[derive(Debug, Clone, Default)]
pub struct FindAllOptions {
    pub filter: Filter,
    pub include: Vec<String>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FindAllOptions {
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Listing metadata, computed from the filter's total and the window the
/// caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: Option<i64>,
    pub offset: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    /// Metadata for a window of `limit` rows starting at `offset` out of
    /// `total`. Without a limit the result is one page holding everything.
    pub fn compute(total: i64, limit: Option<i64>, offset: i64) -> Self {
        match limit {
            Some(limit) if limit > 0 => Self {
                total,
                limit: Some(limit),
                offset,
                total_pages: (total + limit - 1) / limit,
                current_page: offset / limit + 1,
                has_next_page: offset + limit < total,
                has_previous_page: offset > 0,
            },
            _ => Self {
                total,
                limit: None,
                offset,
                total_pages: 1,
                current_page: 1,
                has_next_page: false,
                has_previous_page: offset > 0,
            },
        }
    }
}

/// One page of results plus its listing metadata.
#[derive(Debug)]
pub struct Page<E: Entity> {
    pub rows: Vec<Instance<E>>,
    pub pagination: Pagination,
}

/// The verb surface, shared by [`Engine`] and [`TxConnection`].
///
/// Every default method builds its statement through the pure builders,
/// executes it through the executor, and maps rows into [`Instance`]s, so
/// the same code path serves pooled and transactional calls.
#[async_trait]
pub trait Connection: Send + Sync {
    fn database(&self) -> &dyn Database;

    fn registry(&self) -> &SchemaRegistry;

    /// Insert a new row from a JSON payload and return the created instance.
    async fn create<E: Entity>(&self, data: Document) -> OrmResult<Instance<E>> {
        let descriptor = self.registry().descriptor::<E>()?;
        let stmt = build_insert(&descriptor, &data, Some(Utc::now()))?;
        let row = executor::fetch_optional(self.database(), &stmt)
            .await?
            .ok_or_else(|| {
                OrmError::Database(format!("insert into '{}' returned no row", descriptor.table))
            })?;
        Instance::from_row(descriptor, &row)
    }

    /// Look up one row by primary key. `None` when the key has no row.
    async fn find_by_id<E: Entity, K: Into<DbValue> + Send>(
        &self,
        id: K,
        options: FindOptions,
    ) -> OrmResult<Option<Instance<E>>> {
        let descriptor = self.registry().descriptor::<E>()?;
        let filter = Filter::new().eq(&descriptor.primary_key, id.into());
        self.find_one::<E>(filter, options).await
    }

    /// Look up the first row matching a filter. `None` when nothing matches.
    async fn find_one<E: Entity>(
        &self,
        filter: Filter,
        options: FindOptions,
    ) -> OrmResult<Option<Instance<E>>> {
        let descriptor = self.registry().descriptor::<E>()?;
        let joins = resolve_includes(&descriptor, self.registry(), &options.include)?;
        // With collection joins, LIMIT 1 would truncate the fold; the filter
        // bounds the parent set instead.
        let limit = joins
            .iter()
            .all(|join| !join.relationship.kind.is_collection())
            .then_some(1);
        let stmt = build_select(
            &descriptor,
            SelectParts {
                filter: &filter,
                order: &[],
                limit,
                offset: None,
                joins: &joins,
            },
        )?;
        let rows = executor::fetch_all(self.database(), &stmt).await?;
        let mut folded = fold_rows(&descriptor, &joins, &rows)?;
        if folded.is_empty() {
            return Ok(None);
        }
        Ok(Some(Instance::from_folded(descriptor, folded.swap_remove(0))))
    }

    /// Query all rows matching the options, with listing metadata.
    ///
    /// When a limit is given, a companion COUNT runs first against the same
    /// filter so the metadata and the rows describe one consistent listing;
    /// without a limit the result set itself is the total and no COUNT runs.
    async fn find_all<E: Entity>(&self, options: FindAllOptions) -> OrmResult<Page<E>> {
        let descriptor = self.registry().descriptor::<E>()?;
        let joins = resolve_includes(&descriptor, self.registry(), &options.include)?;

        let counted = if options.limit.is_some() {
            Some(self.count::<E>(options.filter.clone()).await?)
        } else {
            None
        };

        let stmt = build_select(
            &descriptor,
            SelectParts {
                filter: &options.filter,
                order: &options.order,
                limit: options.limit,
                offset: options.offset,
                joins: &joins,
            },
        )?;
        let rows = executor::fetch_all(self.database(), &stmt).await?;
        let folded = fold_rows(&descriptor, &joins, &rows)?;
        let items: Vec<Instance<E>> = folded
            .into_iter()
            .map(|f| Instance::from_folded(descriptor.clone(), f))
            .collect();

        let total = counted.unwrap_or(items.len() as i64);
        let pagination = Pagination::compute(total, options.limit, options.offset.unwrap_or(0));
        Ok(Page {
            rows: items,
            pagination,
        })
    }

    /// Count rows matching a filter.
    async fn count<E: Entity>(&self, filter: Filter) -> OrmResult<i64> {
        let descriptor = self.registry().descriptor::<E>()?;
        let stmt = build_count(&descriptor, &filter)?;
        let row = executor::fetch_optional(self.database(), &stmt)
            .await?
            .ok_or_else(|| {
                OrmError::Database(format!("count on '{}' returned no row", descriptor.table))
            })?;
        row.get("count")
            .and_then(DbValue::as_i64)
            .ok_or_else(|| OrmError::Database("count column missing from result".to_string()))
    }

    /// Whether any row matches a filter.
    async fn exists<E: Entity>(&self, filter: Filter) -> OrmResult<bool> {
        Ok(self.count::<E>(filter).await? > 0)
    }
}

/// The engine: a query capability plus a schema registry.
///
/// Cloning is cheap; both halves are shared handles.
#[derive(Clone)]
pub struct Engine {
    db: Arc<dyn Database>,
    registry: Arc<SchemaRegistry>,
}

impl Engine {
    pub fn new(db: Arc<dyn Database>, registry: Arc<SchemaRegistry>) -> Self {
        Self { db, registry }
    }

    /// Run a callback inside one transaction.
    ///
    /// `Ok` commits, `Err` rolls back and the callback's error is returned
    /// unchanged. A rollback failure is logged but never masks the original
    /// error.
    pub async fn transaction<T, F>(&self, callback: F) -> OrmResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(TxConnection<'t>) -> BoxFuture<'t, OrmResult<T>> + Send,
    {
        let scope = self.db.begin().await.map_err(OrmError::from_driver)?;
        debug!("transaction started");

        let result = callback(TxConnection {
            db: scope.as_database(),
            registry: &self.registry,
        })
        .await;

        match result {
            Ok(value) => {
                scope.commit().await.map_err(OrmError::from_driver)?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                } else {
                    debug!("transaction rolled back");
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Connection for Engine {
    fn database(&self) -> &dyn Database {
        self.db.as_ref()
    }

    fn registry(&self) -> &SchemaRegistry {
        self.registry.as_ref()
    }
}

/// The verb surface scoped to one open transaction.
#[derive(Clone, Copy)]
pub struct TxConnection<'t> {
    db: &'t dyn Database,
    registry: &'t SchemaRegistry,
}

#[async_trait]
impl Connection for TxConnection<'_> {
    fn database(&self) -> &dyn Database {
        self.db
    }

    fn registry(&self) -> &SchemaRegistry {
        self.registry
    }
}
