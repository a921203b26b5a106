//! PostgreSQL execution integration tests.
//!
//! Skipped unless DATABASE_URL points at a reachable database.

use ask_sql::audit::AuditLog;
use ask_sql::config::ConnectionConfig;
use ask_sql::db::{PostgresExecutor, QueryExecutor, Value};
use ask_sql::error::AskError;
use ask_sql::llm::{MockLlmClient, SqlGenerator};
use ask_sql::pipeline::Pipeline;
use ask_sql::retrieval::{ContextRetriever, InMemoryIndex, MockEmbedder};
use std::sync::Arc;

/// Helper to create a test executor.
fn get_test_executor() -> Option<PostgresExecutor> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresExecutor::new(&config).ok()
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute("SELECT 1 AS num, 'hello' AS greeting")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["num", "greeting"]);
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("hello".to_string()));
}

#[tokio::test]
async fn test_numeric_and_dates_are_rendered() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute("SELECT 12345.678::numeric AS amount, DATE '2024-03-01' AS day, NULL::text AS missing")
        .await
        .unwrap();

    assert_eq!(result.rows[0][0], Value::String("12345.678".to_string()));
    assert_eq!(result.rows[0][1], Value::String("2024-03-01".to_string()));
    assert_eq!(result.rows[0][2], Value::Null);
}

#[tokio::test]
async fn test_uuid_json_and_other_types_are_not_null() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute(
            "SELECT gen_random_uuid() AS id, '{\"a\":1}'::jsonb AS j, TIME '10:30:00' AS t, \
             INTERVAL '1 day 02:00:00' AS iv, ARRAY[1, 2] AS arr",
        )
        .await
        .unwrap();

    let row = &result.rows[0];
    match &row[0] {
        Value::String(id) => assert_eq!(id.len(), 36),
        other => panic!("Expected UUID text, got {:?}", other),
    }
    assert_eq!(row[1], Value::String("{\"a\":1}".to_string()));
    assert_eq!(row[2], Value::String("10:30:00".to_string()));
    assert_eq!(row[3], Value::String("1 day 02:00:00".to_string()));
    assert_eq!(row[4], Value::String("<INT4[]>".to_string()));
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute("SELECT 1 AS a, 'x' AS b WHERE false")
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_syntax_error_is_execution_error() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor.execute("SELEC 1").await.unwrap_err();

    assert!(matches!(err, AskError::Execution(_)));
}

#[tokio::test]
async fn test_pipeline_against_database() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(32));
    let index = InMemoryIndex::from_documents(
        embedder.as_ref(),
        vec!["METRICS answer: a constant".to_string()],
    )
    .await
    .unwrap();
    let llm = MockLlmClient::new().then_respond("```sql\nSELECT 42 AS answer;\n```");
    let audit = Arc::new(AuditLog::new(dir.path().join("query_log.jsonl")));
    let generator = SqlGenerator::new(
        ContextRetriever::new(embedder, Arc::new(index)),
        Arc::new(llm),
    );
    let pipeline = Pipeline::new(generator, Arc::new(executor), audit.clone());

    let outcome = pipeline.run("What is the answer?").await.unwrap();

    assert_eq!(outcome.result.rows, vec![vec![Value::Int(42)]]);
    let entries = audit.tail(1).await.unwrap();
    assert_eq!(entries[0].sql, "SELECT 42 AS answer;");
    assert_eq!(entries[0].rows, 1);
}
