//! The question-to-result pipeline.
//!
//! `Idle → Retrieving → Generating → Validating → (Retrying → Validating)? →
//! Executing → Logging → Done`, with `Failed` reachable from any working stage.
//! Only a completed run is written to the audit log.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audit::{AuditLog, QueryLogEntry};
use crate::config::Config;
use crate::db::{PostgresExecutor, QueryExecutor, QueryResult};
use crate::error::{AskError, Result};
use crate::llm::{create_client, PromptTemplate, SqlGenerator};
use crate::retrieval::{create_embedder, ChromaIndex, ContextRetriever};

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Retrieving,
    Generating,
    Validating,
    Retrying,
    Executing,
    Logging,
    Done,
    Failed,
}

impl Stage {
    /// Returns the stage name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Retrying => "retrying",
            Self::Executing => "executing",
            Self::Logging => "logging",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stages a run passed through, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTrace {
    stages: Vec<Stage>,
}

impl StageTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records entry into a stage.
    pub fn record(&mut self, stage: Stage) {
        debug!(stage = %stage, "Pipeline stage");
        self.stages.push(stage);
    }

    /// Returns all recorded stages.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the most recent stage.
    pub fn last(&self) -> Option<Stage> {
        self.stages.last().copied()
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub question: String,
    /// The exact statement that was executed.
    pub sql: String,
    pub context: Vec<String>,
    /// Model calls made (1 or 2).
    pub attempts: u8,
    /// Validator warning, when the statement could not be parsed.
    pub warning: Option<String>,
    pub result: QueryResult,
}

/// Composes generation, execution and audit logging.
pub struct Pipeline {
    generator: SqlGenerator,
    executor: Arc<dyn QueryExecutor>,
    audit: Arc<AuditLog>,
}

impl Pipeline {
    /// Creates a pipeline from its collaborators.
    pub fn new(
        generator: SqlGenerator,
        executor: Arc<dyn QueryExecutor>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            generator,
            executor,
            audit,
        }
    }

    /// Builds the production pipeline: Chroma, the configured embedder and
    /// model, PostgreSQL and the file audit log.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embeddings)?;
        let index = Arc::new(ChromaIndex::new(&config.index)?);
        let retriever = ContextRetriever::new(embedder, index);

        let template = match &config.prompt_template {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::default(),
        };

        let generator = SqlGenerator::new(retriever, create_client(&config.llm)?)
            .with_template(template)
            .with_top_k(config.retrieval.top_k);

        let executor = Arc::new(PostgresExecutor::new(&config.database)?);
        let audit = Arc::new(AuditLog::new(config.audit.path.clone()));

        info!(
            "Pipeline ready: llm={}, embeddings={}, database={}",
            config.llm.provider,
            config.embeddings.resolved_backend(),
            config.database.display_string()
        );

        Ok(Self::new(generator, executor, audit))
    }

    /// Answers a question with validated, executed SQL.
    ///
    /// A run only succeeds once it is in the audit log. If the append fails the
    /// statement has already executed; the `Audit` error says so and carries
    /// the row count, and the trace ends `Logging, Failed`.
    pub async fn run(&self, question: &str) -> Result<PipelineOutcome> {
        self.run_traced(question).await.0
    }

    /// Like [`Pipeline::run`], also returning the stages passed through.
    pub async fn run_traced(&self, question: &str) -> (Result<PipelineOutcome>, StageTrace) {
        let mut trace = StageTrace::new();
        trace.record(Stage::Idle);

        let result = self.run_stages(question, &mut trace).await;

        match &result {
            Ok(_) => trace.record(Stage::Done),
            Err(e) => {
                info!("Pipeline failed at {}: {}", trace.last().unwrap_or(Stage::Idle), e);
                trace.record(Stage::Failed);
            }
        }

        (result, trace)
    }

    async fn run_stages(&self, question: &str, trace: &mut StageTrace) -> Result<PipelineOutcome> {
        let generated = self.generator.generate_traced(question, trace).await?;

        trace.record(Stage::Executing);
        let result = self.executor.execute(&generated.sql).await?;

        trace.record(Stage::Logging);
        self.audit
            .append(&QueryLogEntry::new(question, &generated.sql, result.row_count))
            .await
            .map_err(|e| match e {
                AskError::Audit(msg) => AskError::audit(format!(
                    "Statement executed and returned {} rows, but the run was not recorded: {msg}",
                    result.row_count
                )),
                other => other,
            })?;

        Ok(PipelineOutcome {
            question: question.to_string(),
            sql: generated.sql,
            context: generated.context,
            attempts: generated.attempts,
            warning: generated.warning,
            result,
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("generator", &self.generator)
            .field("audit", &self.audit.path())
            .finish_non_exhaustive()
    }
}
