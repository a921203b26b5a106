//! Result-set types handed back by a [`QueryExecutor`](super::QueryExecutor).

use std::fmt;
use std::time::Duration;

/// A fully materialised result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Columns in select-list order.
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    /// Store round trip, excluding connection set-up.
    pub execution_time: Duration,
    pub row_count: usize,
}

impl QueryResult {
    /// An empty result with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a result from columns and rows; `row_count` follows the rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Name and store type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Store type name as reported by the driver, e.g. `INT8` or `NUMERIC`.
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// One row, with one value per column.
pub type Row = Vec<Value>;

/// A single cell.
///
/// Types without a lossless native mapping (NUMERIC, dates, UUID, JSON) arrive
/// as `String` in the store's own text form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::String("EMEA".to_string()).to_string(), "EMEA");
        assert_eq!(Value::Bytes(vec![0; 16]).to_string(), "<16 bytes>");
    }

    #[test]
    fn test_with_data_counts_rows() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("region", "TEXT"), ColumnInfo::new("revenue", "NUMERIC")],
            vec![
                vec![Value::String("EMEA".to_string()), Value::String("10.50".to_string())],
                vec![Value::String("APAC".to_string()), Value::Null],
            ],
        );

        assert!(!result.is_empty());
        assert_eq!(result.row_count, 2);
        assert_eq!(result.column_names(), vec!["region", "revenue"]);
        assert_eq!(result.execution_time, Duration::ZERO);
    }

    #[test]
    fn test_empty_result() {
        let result = QueryResult::new().with_execution_time(Duration::from_millis(3));

        assert!(result.is_empty());
        assert_eq!(result.row_count, 0);
        assert!(result.column_names().is_empty());
        assert_eq!(result.execution_time, Duration::from_millis(3));
    }
}
