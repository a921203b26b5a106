//! Mock LLM client for testing.
//!
//! Returns scripted responses in order, then falls back to deterministic
//! responses based on keywords in the prompt. Every prompt is recorded.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AskError, Result};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses.
///
/// Used for unit testing and offline demos without making real API calls.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Responses consumed one per call before pattern matching applies.
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    /// Prompts received, in call order.
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next unscripted call.
    pub fn then_respond(self, response: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(response.into()));
        self
    }

    /// Queues a transport failure for the next unscripted call.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Err(message.into()));
        self
    }

    /// Returns the number of completions requested so far.
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Returns every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        if input_lower.contains("count") && input_lower.contains("orders") {
            return "```sql\nSELECT COUNT(*) FROM fct_orders;\n```".to_string();
        }

        if input_lower.contains("revenue") {
            return "```sql\nSELECT region, SUM(total_amount) AS revenue FROM fct_orders GROUP BY region ORDER BY revenue DESC;\n```"
                .to_string();
        }

        if input_lower.contains("customers") {
            return "```sql\nSELECT * FROM dim_customers LIMIT 10;\n```".to_string();
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let input = Self::extract_user_input(messages);
        lock(&self.prompts).push(input.clone());

        if let Some(scripted) = lock(&self.script).pop_front() {
            return scripted.map_err(AskError::llm);
        }

        Ok(self.mock_response(&input))
    }
}
