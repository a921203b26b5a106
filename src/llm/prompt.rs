//! Prompt construction for LLM requests.
//!
//! The first attempt renders a template with `{context}` and `{question}`
//! placeholders. The retry uses a fixed, more directive prompt.

use std::path::Path;

use crate::error::{AskError, Result};

/// Template used when no template file is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a SQL assistant for a PostgreSQL analytics warehouse. Translate the user's question into a single SQL query.

SEMANTIC CONTEXT (tables, metrics and dimensions relevant to the question):
{context}

INSTRUCTIONS:
- Generate exactly one read-only PostgreSQL SELECT statement
- Use only tables and columns that appear in the context
- End the statement with a semicolon
- Limit results to 100 rows unless the question asks otherwise

QUESTION:
{question}

SQL:"#;

/// A prompt template with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Creates a template from text. The text must contain `{question}`.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if !text.contains("{question}") {
            return Err(AskError::config(
                "Prompt template must contain a {question} placeholder",
            ));
        }
        Ok(Self { text })
    }

    /// Loads a template from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AskError::config(format!(
                "Failed to read prompt template {}: {e}",
                path.display()
            ))
        })?;
        Self::new(text)
    }

    /// Renders the template. Context snippets are joined one per line.
    pub fn render(&self, context: &[String], question: &str) -> String {
        self.text
            .replace("{context}", &context.join("\n"))
            .replace("{question}", question)
    }
}

/// Builds the stricter prompt used for the single retry.
pub fn build_retry_prompt(context: &[String], question: &str) -> String {
    format!(
        "Return ONLY a valid SQL SELECT query for this question.\nQuestion: {}\nContext: {}\n",
        question,
        context.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_context() -> Vec<String> {
        vec![
            r#"ENTITIES orders: {"model": "fct_orders"}"#.to_string(),
            r#"METRICS revenue: {"sql": "SUM(total_amount)"}"#.to_string(),
        ]
    }

    #[test]
    fn test_default_template_renders_context_and_question() {
        let prompt = PromptTemplate::default().render(&sample_context(), "Revenue by region?");

        assert!(prompt.contains("ENTITIES orders"));
        assert!(prompt.contains("METRICS revenue"));
        assert!(prompt.contains("Revenue by region?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_context_snippets_are_newline_joined_in_order() {
        let template = PromptTemplate::new("{context}|{question}").unwrap();
        let prompt = template.render(&sample_context(), "q");

        assert_eq!(
            prompt,
            "ENTITIES orders: {\"model\": \"fct_orders\"}\nMETRICS revenue: {\"sql\": \"SUM(total_amount)\"}|q"
        );
    }

    #[test]
    fn test_empty_context_still_renders() {
        let template = PromptTemplate::new("Context: {context}\nQ: {question}").unwrap();
        assert_eq!(template.render(&[], "How many orders?"), "Context: \nQ: How many orders?");
    }

    #[test]
    fn test_template_without_question_is_rejected() {
        let err = PromptTemplate::new("Context only: {context}").unwrap_err();
        assert!(matches!(err, AskError::Config(_)));
    }

    #[test]
    fn test_template_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Schema:\n{{context}}\nAsk: {{question}}").unwrap();

        let template = PromptTemplate::from_file(file.path()).unwrap();

        assert_eq!(template.render(&["t".to_string()], "q"), "Schema:\nt\nAsk: q");
    }

    #[test]
    fn test_template_from_missing_file() {
        let err = PromptTemplate::from_file(Path::new("/nonexistent/prompt.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read prompt template"));
    }

    #[test]
    fn test_retry_prompt_is_directive() {
        let prompt = build_retry_prompt(&sample_context(), "Revenue by region?");

        assert!(prompt.starts_with("Return ONLY a valid SQL SELECT query"));
        assert!(prompt.contains("Question: Revenue by region?"));
        assert!(prompt.contains("Context: ENTITIES orders"));
    }
}
