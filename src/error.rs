//! Error types for ask-sql.
//!
//! Every stage of the question-to-result pipeline fails with its own variant so
//! callers (the CLI, a dashboard) can render a specific message.

use thiserror::Error;

/// Main error type for ask-sql operations.
#[derive(Error, Debug)]
pub enum AskError {
    /// Embedding service or vector index unreachable or returned an error.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// No valid SQL could be produced, even after the stricter retry.
    #[error("Generation error: {0}")]
    Generation(String),

    /// The relational store rejected or failed to run accepted SQL.
    #[error("Execution error: {0}")]
    Execution(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audit log could not be written or read.
    #[error("Audit log error: {0}")]
    Audit(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskError {
    /// Creates a retrieval error with the given message.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Creates a generation error with the given message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an audit log error with the given message.
    pub fn audit(msg: impl Into<String>) -> Self {
        Self::Audit(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Retrieval(_) => "Retrieval Error",
            Self::Generation(_) => "Generation Error",
            Self::Execution(_) => "Execution Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Audit(_) => "Audit Log Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AskError.
pub type Result<T> = std::result::Result<T, AskError>;
