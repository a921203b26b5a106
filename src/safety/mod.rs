//! Query safety validation module.
//!
//! Decides whether a candidate SQL string may be sent to the database. The check
//! is two-tier: a fast textual screen here, and the database itself as the final
//! authority on syntax.

mod validator;

pub use validator::{validate, SqlValidator, FORBIDDEN_KEYWORDS};

use std::fmt;

/// The top-level kind of a parsed SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    /// UNION, INTERSECT or EXCEPT at the top level.
    SetOperation,
    Values,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    Merge,
    /// Any statement the validator has no name for.
    Other,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::SetOperation => write!(f, "set operation"),
            Self::Values => write!(f, "VALUES"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Merge => write!(f, "MERGE"),
            Self::Other => write!(f, "unknown statement"),
        }
    }
}

/// Why a candidate statement was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Input was empty, whitespace, or parsed to no statements.
    Empty,
    /// Input does not contain the word "select" anywhere.
    MissingSelect,
    /// Input mentions a write or DDL keyword, possibly inside a comment or literal.
    ForbiddenKeyword(&'static str),
    /// Input parsed to more than one statement.
    MultipleStatements(usize),
    /// Input parsed to a single statement that is not a plain SELECT.
    NotSelect(StatementKind),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty SQL"),
            Self::MissingSelect => write!(f, "no SELECT found"),
            Self::ForbiddenKeyword(kw) => write!(f, "forbidden keyword '{kw}'"),
            Self::MultipleStatements(n) => write!(f, "{n} statements, expected exactly one"),
            Self::NotSelect(kind) => write!(f, "{kind} is not allowed, only SELECT"),
        }
    }
}

/// Outcome of validating a candidate statement.
///
/// There is no partial state: a statement is accepted or rejected, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Why the statement was rejected. `None` means accepted.
    pub reason: Option<RejectReason>,
    /// Cautionary note on an accepted statement (set when parsing failed).
    pub warning: Option<String>,
}

impl Verdict {
    /// An accepted verdict with no warning.
    pub fn accept() -> Self {
        Self {
            reason: None,
            warning: None,
        }
    }

    /// An accepted verdict carrying a cautionary warning.
    pub fn accept_with_warning(warning: impl Into<String>) -> Self {
        Self {
            reason: None,
            warning: Some(warning.into()),
        }
    }

    /// A rejected verdict.
    pub fn reject(reason: RejectReason) -> Self {
        Self {
            reason: Some(reason),
            warning: None,
        }
    }

    /// Returns true if the statement may be executed.
    pub fn is_accepted(&self) -> bool {
        self.reason.is_none()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, &self.warning) {
            (Some(reason), _) => write!(f, "rejected: {reason}"),
            (None, Some(warning)) => write!(f, "accepted (warning: {warning})"),
            (None, None) => write!(f, "accepted"),
        }
    }
}
