//! Scripted database capability for integration tests.
//!
//! Responses are consumed in order; every call and transaction event is
//! recorded so tests can assert exactly what SQL the engine issued.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use strata_orm::{Database, DbValue, DriverError, Row, TransactionScope};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Query(String, Vec<DbValue>),
    Execute(String, Vec<DbValue>),
    Begin,
    Commit,
    Rollback,
}

/// One scripted response.
pub enum Script {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(DriverError),
}

struct Inner {
    script: Mutex<VecDeque<Script>>,
    events: Mutex<Vec<Event>>,
}

impl Inner {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn next(&self, call: &str) -> Script {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted {} call", call))
    }
}

#[derive(Clone)]
pub struct MockDb {
    inner: Arc<Inner>,
}

impl MockDb {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(script.into()),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().unwrap().clone()
    }

    /// SQL of every statement issued, in order.
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Query(sql, _) | Event::Execute(sql, _) => Some(sql),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Database for MockDb {
    async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
        self.inner
            .record(Event::Query(sql.to_string(), params.to_vec()));
        match self.inner.next("query") {
            Script::Rows(rows) => Ok(rows),
            Script::Affected(_) => panic!("query call hit an Affected script entry"),
            Script::Fail(err) => Err(err),
        }
    }

    async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DriverError> {
        self.inner
            .record(Event::Execute(sql.to_string(), params.to_vec()));
        match self.inner.next("execute") {
            Script::Rows(_) => panic!("execute call hit a Rows script entry"),
            Script::Affected(count) => Ok(count),
            Script::Fail(err) => Err(err),
        }
    }

    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
        self.inner.record(Event::Begin);
        Ok(Box::new(MockTx {
            inner: self.inner.clone(),
        }))
    }
}

struct MockTx {
    inner: Arc<Inner>,
}

#[async_trait]
impl Database for MockTx {
    async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
        self.inner
            .record(Event::Query(sql.to_string(), params.to_vec()));
        match self.inner.next("query") {
            Script::Rows(rows) => Ok(rows),
            Script::Affected(_) => panic!("query call hit an Affected script entry"),
            Script::Fail(err) => Err(err),
        }
    }

    async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DriverError> {
        self.inner
            .record(Event::Execute(sql.to_string(), params.to_vec()));
        match self.inner.next("execute") {
            Script::Rows(_) => panic!("execute call hit a Rows script entry"),
            Script::Affected(count) => Ok(count),
            Script::Fail(err) => Err(err),
        }
    }

    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
        Err(DriverError::message("nested transactions are not supported"))
    }
}

#[async_trait]
impl TransactionScope for MockTx {
    fn as_database(&self) -> &dyn Database {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.inner.record(Event::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.inner.record(Event::Rollback);
        Ok(())
    }
}

/// Build a row from (name, value) pairs.
pub fn row(columns: Vec<(&str, DbValue)>) -> Row {
    Row::new(
        columns
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}
