//! Response cleaning for LLM outputs.
//!
//! Models wrap SQL in markdown fences and surround it with prose. Cleaning strips
//! the fences and isolates the first `SELECT ... ;` span.

use regex::Regex;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?i)```sql|```").expect("fence pattern is valid"))
}

fn select_pattern() -> &'static Regex {
    static SELECT: OnceLock<Regex> = OnceLock::new();
    SELECT.get_or_init(|| Regex::new(r"(?is)(select.*?;)").expect("select pattern is valid"))
}

/// Extracts a single SQL statement from raw model output.
///
/// Removes every ```` ```sql ```` and ```` ``` ```` marker, trims, then returns the
/// span from the first case-insensitive `SELECT` through the next `;`. If there
/// is no terminated span, the whole trimmed text is returned unchanged.
pub fn clean_sql_output(raw_output: &str) -> String {
    let unfenced = fence_pattern().replace_all(raw_output, "");
    let trimmed = unfenced.trim();

    match select_pattern().captures(trimmed).and_then(|c| c.get(1)) {
        Some(span) => span.as_str().trim().to_string(),
        None => trimmed.to_string(),
    }
}
