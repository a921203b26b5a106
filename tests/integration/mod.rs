//! Integration tests for ask-sql.

pub mod pipeline_test;
pub mod postgres_test;
pub mod validator_test;
