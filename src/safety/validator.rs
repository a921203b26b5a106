//! SQL validation logic.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect to confirm that a candidate is a
//! single SELECT. A parse failure is not a rejection: the statement is accepted
//! with a warning and the database gets the final word on syntax.

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::warn;

use super::{RejectReason, StatementKind, Verdict};

/// Substrings that reject a statement wherever they appear, comments and
/// string literals included.
pub const FORBIDDEN_KEYWORDS: [&str; 6] =
    ["insert", "update", "delete", "drop", "alter", "truncate"];

/// Validator that screens candidate SQL before execution.
#[derive(Debug)]
pub struct SqlValidator {
    dialect: PostgreSqlDialect,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlValidator {
    /// Creates a new SQL validator.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Validates a SQL string and returns the verdict with its reason.
    pub fn check(&self, sql: &str) -> Verdict {
        if sql.trim().is_empty() {
            return Verdict::reject(RejectReason::Empty);
        }

        let lowered = sql.to_lowercase();
        if !lowered.contains("select") {
            return Verdict::reject(RejectReason::MissingSelect);
        }

        if let Some(keyword) = FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|kw| lowered.contains(kw))
        {
            return Verdict::reject(RejectReason::ForbiddenKeyword(keyword));
        }

        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                warn!("SQL parse warning, proceeding cautiously: {}", e);
                return Verdict::accept_with_warning(format!(
                    "Could not parse SQL ({e}); the database will perform the final check."
                ));
            }
        };

        match statements.as_slice() {
            [] => Verdict::reject(RejectReason::Empty),
            [statement] => match statement_kind(statement) {
                StatementKind::Select => Verdict::accept(),
                kind => Verdict::reject(RejectReason::NotSelect(kind)),
            },
            many => Verdict::reject(RejectReason::MultipleStatements(many.len())),
        }
    }

    /// Returns true if the SQL may be executed.
    pub fn validate(&self, sql: &str) -> bool {
        self.check(sql).is_accepted()
    }
}

/// Convenience function to validate SQL without creating a validator instance.
pub fn validate(sql: &str) -> bool {
    SqlValidator::new().validate(sql)
}

/// Determines the top-level kind of a single parsed statement.
fn statement_kind(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Query(query) => set_expr_kind(&query.body),
        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        Statement::Merge { .. } => StatementKind::Merge,
        Statement::Drop { .. } => StatementKind::Drop,
        Statement::Truncate { .. } => StatementKind::Truncate,
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. } => StatementKind::Alter,
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. } => StatementKind::Create,
        Statement::Grant { .. } => StatementKind::Grant,
        Statement::Revoke { .. } => StatementKind::Revoke,
        Statement::Explain { .. } => StatementKind::Explain,
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. } => StatementKind::Show,
        _ => StatementKind::Other,
    }
}

/// Determines the kind of a query body. A WITH clause does not change the kind.
fn set_expr_kind(body: &SetExpr) -> StatementKind {
    match body {
        // SELECT ... INTO creates a table
        SetExpr::Select(select) if select.into.is_some() => StatementKind::Create,
        SetExpr::Select(_) => StatementKind::Select,
        SetExpr::Query(inner) => set_expr_kind(&inner.body),
        SetExpr::SetOperation { .. } => StatementKind::SetOperation,
        SetExpr::Values(_) => StatementKind::Values,
        SetExpr::Insert(_) => StatementKind::Insert,
        SetExpr::Update(_) => StatementKind::Update,
        _ => StatementKind::Other,
    }
}
