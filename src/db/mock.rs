//! Mock query executor for testing.

use super::{QueryExecutor, QueryResult};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A query executor that returns a canned result or a canned error.
///
/// Records every statement it receives so tests can assert on what ran.
#[derive(Debug)]
pub struct MockExecutor {
    outcome: std::result::Result<QueryResult, String>,
    executed: Mutex<Vec<String>>,
}

impl MockExecutor {
    /// Creates an executor that returns an empty result.
    pub fn new() -> Self {
        Self::with_result(QueryResult::new())
    }

    /// Creates an executor that returns the given result for every call.
    pub fn with_result(result: QueryResult) -> Self {
        Self {
            outcome: Ok(result),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Creates an executor that fails every call with the given store message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of statements executed so far.
    pub fn call_count(&self) -> usize {
        self.executed().len()
    }

    /// Returns every statement received, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sql.to_string());

        match &self.outcome {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(AskError::execution(message.clone())),
        }
    }
}
