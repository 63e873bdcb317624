//! Dummy LLM provider — echoes input back prefixed with `[echo]`.
//! Used for local runs and tests without an API key. Its output is never
//! valid classifier JSON, so the pipeline always takes the fallback intent.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}
