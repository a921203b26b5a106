//! Connectivity checks for the relational store and the vector index.
//!
//! Each check reports its own outcome; one failing check never hides another.

use crate::db::{QueryExecutor, Value};
use crate::retrieval::{ChromaIndex, VectorIndex};
use tracing::{info, warn};

/// Lists a handful of user tables so an empty warehouse is obvious.
const SAMPLE_TABLES_SQL: &str = "SELECT table_schema || '.' || table_name AS table_name \
     FROM information_schema.tables \
     WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
     ORDER BY 1 LIMIT 10";

/// Outcome of one connectivity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    /// Success summary or the error message.
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        info!("{} check passed: {}", name, detail);
        Self {
            name,
            ok: true,
            detail,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        warn!("{} check failed: {}", name, detail);
        Self {
            name,
            ok: false,
            detail,
        }
    }
}

/// Runs `SELECT 1` and lists sample tables.
pub async fn check_database(executor: &dyn QueryExecutor, target: &str) -> CheckResult {
    const NAME: &str = "postgres";

    let ping = match executor.execute("SELECT 1 AS ok").await {
        Ok(result) => result,
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    };
    if ping.rows.first().and_then(|row| row.first()) != Some(&Value::Int(1)) {
        return CheckResult::fail(NAME, format!("Unexpected reply from {target}"));
    }

    let tables = match executor.execute(SAMPLE_TABLES_SQL).await {
        Ok(result) => result
            .rows
            .iter()
            .filter_map(|row| row.first().map(|v| v.to_string()))
            .collect::<Vec<_>>(),
        Err(e) => {
            return CheckResult::fail(
                NAME,
                format!("Connected to {target}, table listing failed: {e}"),
            );
        }
    };

    let listing = if tables.is_empty() {
        "no user tables yet".to_string()
    } else {
        format!("tables: {}", tables.join(", "))
    };
    CheckResult::pass(NAME, format!("Connected to {target}; {listing}"))
}

/// Pings the index server, then looks up the configured collection.
pub async fn check_index(index: &ChromaIndex) -> CheckResult {
    const NAME: &str = "chroma";

    if let Err(e) = index.heartbeat().await {
        return CheckResult::fail(NAME, e.to_string());
    }

    match index.dimension().await {
        Ok(dimension) => {
            let dimension = dimension.map_or_else(|| "unknown".to_string(), |d| d.to_string());
            CheckResult::pass(
                NAME,
                format!(
                    "Heartbeat OK at {}; collection '{}' (dimension {})",
                    index.base_url(),
                    index.collection(),
                    dimension
                ),
            )
        }
        Err(e) => CheckResult::fail(NAME, format!("Heartbeat OK, but {e}")),
    }
}
