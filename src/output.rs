//! Plain-text rendering for command output.
//!
//! Everything here returns a `String`; the binary decides where it goes.

use crate::audit::QueryLogEntry;
use crate::health::CheckResult;
use crate::db::QueryResult;
use crate::error::AskError;
use crate::pipeline::PipelineOutcome;
use crate::safety::Verdict;
use std::fmt::Write;

/// Widest a single cell is allowed to render before it is cut.
const MAX_CELL_WIDTH: usize = 40;

/// Renders a pipeline outcome: the SQL, any warning, then the first rows.
pub fn format_outcome(outcome: &PipelineOutcome, max_rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SQL:\n{}\n", outcome.sql);
    if let Some(warning) = &outcome.warning {
        let _ = writeln!(out, "Warning: {warning}\n");
    }
    out.push_str(&format_table(&outcome.result, max_rows));
    out
}

/// Renders up to `max_rows` rows as an aligned text table with a summary line.
pub fn format_table(result: &QueryResult, max_rows: usize) -> String {
    let mut out = String::new();

    if result.columns.is_empty() {
        let _ = writeln!(out, "(no columns)");
        return out;
    }

    let headers: Vec<String> = result.column_names().iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .take(max_rows)
        .map(|row| row.iter().map(|v| truncate(&v.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    write_row(&mut out, &headers, &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", separator.join("-+-"));
    for row in &rows {
        write_row(&mut out, row, &widths);
    }

    let shown = rows.len();
    let total = result.row_count;
    let elapsed_ms = result.execution_time.as_millis();
    if shown < total {
        let _ = writeln!(out, "({shown} of {total} rows, {elapsed_ms} ms)");
    } else {
        let noun = if total == 1 { "row" } else { "rows" };
        let _ = writeln!(out, "({total} {noun}, {elapsed_ms} ms)");
    }
    out
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}

fn truncate(cell: &str) -> String {
    let single_line = cell.replace('\n', " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let cut: String = single_line.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{cut}...")
}

/// Message for a fatal error, needed only when logs go to a file.
///
/// With stderr logging the `error!` event already reached the terminal.
pub fn format_fatal_error(error: &AskError, log_to_file: bool) -> Option<String> {
    log_to_file.then(|| format!("Error ({}): {}\n", error.category(), error))
}

/// Renders a validator verdict for `asksql validate`.
pub fn format_verdict(verdict: &Verdict) -> String {
    let mut out = if verdict.is_accepted() {
        "OK: statement may be executed\n".to_string()
    } else {
        format!("{verdict}\n")
    };
    if let (true, Some(warning)) = (verdict.is_accepted(), &verdict.warning) {
        let _ = writeln!(out, "Warning: {warning}");
    }
    out
}

/// Renders connectivity checks, one line each.
pub fn format_checks(checks: &[CheckResult]) -> String {
    let mut out = String::new();
    for check in checks {
        let status = if check.ok { "OK" } else { "FAIL" };
        let _ = writeln!(out, "{:<8} {:<4} {}", check.name, status, check.detail);
    }
    out
}

/// Renders audit entries, oldest first.
pub fn format_log_entries(entries: &[QueryLogEntry]) -> String {
    if entries.is_empty() {
        return "No queries logged yet.\n".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let when = entry
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "[{when}] {} ({} rows)", entry.question, entry.rows);
        let _ = writeln!(out, "    {}", entry.sql.replace('\n', " "));
    }
    out
}
