//! Question-to-SQL generation with a single validation retry.
//!
//! One call retrieves context, renders the prompt, asks the model, cleans the
//! answer and validates it. A rejected candidate gets exactly one more attempt
//! with a stricter prompt; a second rejection is final.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AskError, Result};
use crate::llm::parser::clean_sql_output;
use crate::llm::prompt::{build_retry_prompt, PromptTemplate};
use crate::llm::{LlmClient, Message};
use crate::pipeline::{Stage, StageTrace};
use crate::retrieval::ContextRetriever;
use crate::safety::{SqlValidator, Verdict};

/// Default number of context snippets per question.
pub const DEFAULT_TOP_K: usize = 5;

/// SQL that passed validation, with what it was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSql {
    /// The validated statement.
    pub sql: String,
    /// Context snippets that were put in the prompt.
    pub context: Vec<String>,
    /// Model calls made: 1, or 2 when the retry was needed.
    pub attempts: u8,
    /// Set when the validator could not parse the statement but let it through.
    pub warning: Option<String>,
}

/// Generates validated SQL for natural-language questions.
pub struct SqlGenerator {
    retriever: ContextRetriever,
    llm: Arc<dyn LlmClient>,
    template: PromptTemplate,
    validator: SqlValidator,
    top_k: usize,
}

impl SqlGenerator {
    /// Creates a generator with the default prompt template and top-k.
    pub fn new(retriever: ContextRetriever, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            retriever,
            llm,
            template: PromptTemplate::default(),
            validator: SqlValidator::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Sets the prompt template for the first attempt.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Sets how many context snippets are retrieved.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Generates validated SQL for a question.
    pub async fn generate(&self, question: &str) -> Result<GeneratedSql> {
        self.generate_traced(question, &mut StageTrace::new()).await
    }

    /// Generates validated SQL, recording each stage entered.
    pub async fn generate_traced(
        &self,
        question: &str,
        trace: &mut StageTrace,
    ) -> Result<GeneratedSql> {
        if question.trim().is_empty() {
            return Err(AskError::generation("Question is empty"));
        }

        trace.record(Stage::Retrieving);
        let context = self.retriever.retrieve(question, self.top_k).await?;

        trace.record(Stage::Generating);
        let prompt = self.template.render(&context, question);
        let sql = self.ask_model(prompt).await?;

        trace.record(Stage::Validating);
        let first = self.validator.check(&sql);
        if first.is_accepted() {
            return Ok(Self::accepted(sql, context, 1, first));
        }

        warn!("Generated SQL rejected ({}), retrying once", first);

        trace.record(Stage::Retrying);
        let sql = self.ask_model(build_retry_prompt(&context, question)).await?;

        trace.record(Stage::Validating);
        let second = self.validator.check(&sql);
        if second.is_accepted() {
            return Ok(Self::accepted(sql, context, 2, second));
        }

        Err(AskError::generation(format!(
            "No valid SQL after one retry: {}. Last candidate: {}",
            second, sql
        )))
    }

    /// Sends one prompt and returns the cleaned SQL candidate.
    async fn ask_model(&self, prompt: String) -> Result<String> {
        let raw = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(|e| AskError::generation(format!("Model call failed: {}", e)))?;
        debug!("Raw model output: {}", raw);

        Ok(clean_sql_output(&raw))
    }

    fn accepted(sql: String, context: Vec<String>, attempts: u8, verdict: Verdict) -> GeneratedSql {
        info!("Generated SQL accepted after {} attempt(s)", attempts);
        GeneratedSql {
            sql,
            context,
            attempts,
            warning: verdict.warning,
        }
    }
}

impl std::fmt::Debug for SqlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("retriever", &self.retriever)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::retrieval::{InMemoryIndex, MockEmbedder};
    use pretty_assertions::assert_eq;

    async fn retriever(docs: &[&str]) -> ContextRetriever {
        let embedder = Arc::new(MockEmbedder::new(64));
        let docs = docs.iter().map(|d| d.to_string()).collect();
        let index = InMemoryIndex::from_documents(embedder.as_ref(), docs)
            .await
            .unwrap();
        ContextRetriever::new(embedder, Arc::new(index))
    }

    async fn generator_with(llm: Arc<MockLlmClient>) -> SqlGenerator {
        let retriever = retriever(&[
            "ENTITIES orders: fct_orders(order_id, total_amount, region)",
            "METRICS revenue: SUM(total_amount)",
        ])
        .await;
        SqlGenerator::new(retriever, llm)
    }

    #[tokio::test]
    async fn test_first_attempt_accepted() {
        let llm = Arc::new(MockLlmClient::new().then_respond(
            "```sql\nSELECT region, SUM(total_amount) FROM fct_orders GROUP BY region;\n```",
        ));
        let generator = generator_with(llm.clone()).await;

        let generated = generator.generate("Revenue by region?").await.unwrap();

        assert_eq!(
            generated.sql,
            "SELECT region, SUM(total_amount) FROM fct_orders GROUP BY region;"
        );
        assert_eq!(generated.attempts, 1);
        assert_eq!(generated.context.len(), 2);
        assert_eq!(llm.call_count(), 1);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Revenue by region?"));
        assert!(prompt.contains("METRICS revenue"));
    }

    #[tokio::test]
    async fn test_raw_output_is_cleaned_before_validation() {
        let llm = Arc::new(MockLlmClient::new().then_respond(
            "Here you go:\n```sql\nSELECT COUNT(*) FROM fct_orders;\n```\nLet me know!",
        ));
        let generator = generator_with(llm.clone()).await;

        let generated = generator.generate("How many orders?").await.unwrap();

        assert_eq!(generated.sql, "SELECT COUNT(*) FROM fct_orders;");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_then_retry_accepted() {
        let llm = Arc::new(
            MockLlmClient::new()
                .then_respond("DROP TABLE fct_orders;")
                .then_respond("SELECT COUNT(*) FROM fct_orders;"),
        );
        let generator = generator_with(llm.clone()).await;
        let mut trace = StageTrace::new();

        let generated = generator
            .generate_traced("How many orders?", &mut trace)
            .await
            .unwrap();

        assert_eq!(generated.sql, "SELECT COUNT(*) FROM fct_orders;");
        assert_eq!(generated.attempts, 2);
        assert_eq!(llm.call_count(), 2);
        assert!(llm.prompts()[1].starts_with("Return ONLY a valid SQL SELECT query"));
        assert!(llm.prompts()[1].contains("Question: How many orders?"));
        assert_eq!(
            trace.stages(),
            &[
                Stage::Retrieving,
                Stage::Generating,
                Stage::Validating,
                Stage::Retrying,
                Stage::Validating,
            ]
        );
    }

    #[tokio::test]
    async fn test_two_rejections_fail_without_third_call() {
        let llm = Arc::new(
            MockLlmClient::new()
                .then_respond("I can't help with that.")
                .then_respond("DELETE FROM fct_orders WHERE id IN (SELECT id FROM stale_orders)")
                .then_respond("SELECT 1;"),
        );
        let generator = generator_with(llm.clone()).await;

        let err = generator.generate("Wipe the orders").await.unwrap_err();

        assert!(matches!(err, AskError::Generation(_)));
        assert!(err.to_string().contains("forbidden keyword 'delete'"));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_generation_error() {
        let llm = Arc::new(MockLlmClient::new().then_fail("rate limited"));
        let generator = generator_with(llm.clone()).await;

        let err = generator.generate("Revenue by region?").await.unwrap_err();

        assert!(matches!(err, AskError::Generation(_)));
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_question_calls_nothing() {
        let llm = Arc::new(MockLlmClient::new());
        let generator = generator_with(llm.clone()).await;

        let err = generator.generate("   ").await.unwrap_err();

        assert!(matches!(err, AskError::Generation(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_context_still_prompts() {
        let llm = Arc::new(MockLlmClient::new().then_respond("SELECT 1;"));
        let generator = SqlGenerator::new(retriever(&[]).await, llm.clone());

        let generated = generator.generate("Anything at all?").await.unwrap();

        assert!(generated.context.is_empty());
        assert_eq!(llm.call_count(), 1);
        assert!(llm.prompts()[0].contains("Anything at all?"));
    }

    #[tokio::test]
    async fn test_unparseable_select_passes_with_warning() {
        let llm = Arc::new(MockLlmClient::new().then_respond("SELECT FROM ???;"));
        let generator = generator_with(llm.clone()).await;

        let generated = generator.generate("Revenue?").await.unwrap();

        assert_eq!(generated.attempts, 1);
        assert!(generated.warning.is_some());
    }

    #[tokio::test]
    async fn test_custom_template_and_top_k() {
        let llm = Arc::new(MockLlmClient::new().then_respond("SELECT 1;"));
        let generator = generator_with(llm.clone())
            .await
            .with_template(PromptTemplate::new("CTX[{context}] Q[{question}]").unwrap())
            .with_top_k(1);

        let generated = generator.generate("revenue").await.unwrap();

        assert_eq!(generated.context.len(), 1);
        assert!(llm.prompts()[0].starts_with("CTX["));
        assert!(llm.prompts()[0].ends_with("Q[revenue]"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_stops_before_model() {
        let llm = Arc::new(MockLlmClient::new());
        let retriever = ContextRetriever::new(
            Arc::new(MockEmbedder::failing("embedding service down")),
            Arc::new(InMemoryIndex::new()),
        );
        let generator = SqlGenerator::new(retriever, llm.clone());

        let err = generator.generate("Revenue?").await.unwrap_err();

        assert!(matches!(err, AskError::Retrieval(_)));
        assert_eq!(llm.call_count(), 0);
    }
}
