//! End-to-end pipeline tests.
//!
//! Runs questions through retrieval, generation, validation, execution and the
//! audit log using in-process mocks only.

use ask_sql::audit::AuditLog;
use ask_sql::db::{ColumnInfo, MockExecutor, QueryResult, Value};
use ask_sql::error::AskError;
use ask_sql::llm::{MockLlmClient, SqlGenerator};
use ask_sql::pipeline::{Pipeline, Stage};
use ask_sql::retrieval::{ContextRetriever, InMemoryIndex, MockEmbedder};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const SEMANTIC_DOCS: [&str; 4] = [
    "ENTITIES customers: dim_customers(customer_id, name, signup_date, region)",
    "ENTITIES orders: fct_orders(order_id, customer_id, total_amount, order_date)",
    "METRICS revenue: SUM(fct_orders.total_amount)",
    "DIMENSIONS region: dim_customers.region",
];

struct Harness {
    pipeline: Pipeline,
    llm: Arc<MockLlmClient>,
    executor: Arc<MockExecutor>,
    audit: Arc<AuditLog>,
    _dir: tempfile::TempDir,
}

async fn harness(llm: MockLlmClient, executor: MockExecutor, top_k: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(128));
    let index = InMemoryIndex::from_documents(
        embedder.as_ref(),
        SEMANTIC_DOCS.iter().map(|d| d.to_string()).collect(),
    )
    .await
    .unwrap();

    let llm = Arc::new(llm);
    let executor = Arc::new(executor);
    let audit = Arc::new(AuditLog::new(dir.path().join("logs").join("query_log.jsonl")));

    let generator = SqlGenerator::new(ContextRetriever::new(embedder, Arc::new(index)), llm.clone())
        .with_top_k(top_k);

    Harness {
        pipeline: Pipeline::new(generator, executor.clone(), audit.clone()),
        llm,
        executor,
        audit,
        _dir: dir,
    }
}

fn revenue_result() -> QueryResult {
    QueryResult::with_data(
        vec![
            ColumnInfo::new("region", "text"),
            ColumnInfo::new("revenue", "numeric"),
        ],
        vec![
            vec![Value::String("EMEA".to_string()), Value::String("1200.50".to_string())],
            vec![Value::String("APAC".to_string()), Value::String("980.00".to_string())],
        ],
    )
}

#[tokio::test]
async fn test_question_to_logged_result() {
    let h = harness(MockLlmClient::new(), MockExecutor::with_result(revenue_result()), 2).await;

    let outcome = h.pipeline.run("What is revenue by region?").await.unwrap();

    assert!(outcome.sql.starts_with("SELECT region, SUM(total_amount)"));
    assert!(outcome.sql.ends_with(';'));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.context.len(), 2);
    assert_eq!(outcome.result.row_count, 2);

    // The prompt carries the retrieved context and the question
    let prompt = &h.llm.prompts()[0];
    assert!(prompt.contains("What is revenue by region?"));
    for snippet in &outcome.context {
        assert!(prompt.contains(snippet.as_str()));
    }

    let entries = h.audit.tail(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "What is revenue by region?");
    assert_eq!(entries[0].sql, outcome.sql);
    assert_eq!(entries[0].rows, 2);
    assert!(entries[0].timestamp.is_some());
}

#[tokio::test]
async fn test_rejected_first_candidate_is_retried_once() {
    let llm = MockLlmClient::new()
        .then_respond("DROP TABLE fct_orders;")
        .then_respond("Here you go:\n```sql\nSELECT COUNT(*) FROM fct_orders;\n```");
    let h = harness(llm, MockExecutor::with_result(revenue_result()), 3).await;

    let (outcome, trace) = h.pipeline.run_traced("How many orders?").await;
    let outcome = outcome.unwrap();

    assert_eq!(outcome.sql, "SELECT COUNT(*) FROM fct_orders;");
    assert_eq!(outcome.attempts, 2);
    assert_eq!(h.llm.call_count(), 2);
    assert!(h.llm.prompts()[1].starts_with("Return ONLY a valid SQL SELECT query"));
    assert_eq!(h.executor.executed(), vec!["SELECT COUNT(*) FROM fct_orders;"]);
    assert!(trace.stages().contains(&Stage::Retrying));
    assert_eq!(trace.last(), Some(Stage::Done));
}

#[tokio::test]
async fn test_two_rejections_never_reach_the_database() {
    let llm = MockLlmClient::new()
        .then_respond("I cannot help with that.")
        .then_respond("Sorry, still no query.");
    let h = harness(llm, MockExecutor::with_result(revenue_result()), 3).await;

    let (result, trace) = h.pipeline.run_traced("Delete everything").await;

    assert!(matches!(result.unwrap_err(), AskError::Generation(_)));
    assert_eq!(h.llm.call_count(), 2);
    assert_eq!(h.executor.call_count(), 0);
    assert_eq!(trace.last(), Some(Stage::Failed));
    assert!(h.audit.tail(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_database_error_is_reported_and_not_logged() {
    let h = harness(
        MockLlmClient::new(),
        MockExecutor::failing("relation \"fct_orders\" does not exist"),
        2,
    )
    .await;

    let err = h.pipeline.run("Count all orders").await.unwrap_err();

    assert!(matches!(err, AskError::Execution(_)));
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(h.executor.call_count(), 1);
    assert!(h.audit.tail(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_successive_runs_append_in_order() {
    let h = harness(MockLlmClient::new(), MockExecutor::with_result(revenue_result()), 2).await;

    h.pipeline.run("Count all orders").await.unwrap();
    h.pipeline.run("Show me customers").await.unwrap();
    h.pipeline.run("Revenue this year").await.unwrap();

    let questions: Vec<String> = h
        .audit
        .tail(10)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.question)
        .collect();
    assert_eq!(
        questions,
        vec!["Count all orders", "Show me customers", "Revenue this year"]
    );

    let last_two = h.audit.tail(2).await.unwrap();
    assert_eq!(last_two[0].question, "Show me customers");
}

#[tokio::test]
async fn test_top_k_zero_generates_without_context() {
    let h = harness(MockLlmClient::new(), MockExecutor::with_result(revenue_result()), 0).await;

    let outcome = h.pipeline.run("Count all orders").await.unwrap();

    assert!(outcome.context.is_empty());
    assert_eq!(outcome.sql, "SELECT COUNT(*) FROM fct_orders;");
}
