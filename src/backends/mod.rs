//! Database backend bindings
//!
//! Concrete implementations of the consumed capability
//! ([`Database`](crate::database::Database)). Only PostgreSQL via sqlx is
//! bound here; tests substitute scripted capabilities instead.

pub mod postgres;

pub use postgres::PostgresDatabase;
