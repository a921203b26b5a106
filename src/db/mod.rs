//! Relational store access.
//!
//! The pipeline only needs one operation from the store: run a validated SQL
//! string and hand back a table. [`QueryExecutor`] is that seam.

mod mock;
mod postgres;
mod types;

pub use mock::MockExecutor;
pub use postgres::PostgresExecutor;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Runs SQL against a relational store.
///
/// Implementations execute exactly the text they are given. Failures surface as
/// `AskError::Execution` with the store's message preserved.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes a SQL statement and returns the full result set.
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}
