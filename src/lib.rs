//! ask-sql - natural language questions to validated, read-only SQL.
//!
//! A question flows through context retrieval, SQL generation with one retry,
//! safety validation, execution against PostgreSQL and an append-only audit log.

pub mod audit;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod llm;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod retrieval;
pub mod safety;
