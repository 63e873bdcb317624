//! Prompt assembly for the two model calls.
//!
//! Templates live under `config/prompts/` as plain text with `{{key}}`
//! placeholders. A missing or empty template file falls back to the inline
//! default, so the service still runs from an incomplete checkout.
//!
//! Substitution is a single left-to-right pass: text inserted for one
//! placeholder is never rescanned, so a query containing `{{context}}`
//! stays literal.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CLASSIFY_TEMPLATE: &str = "intent_classify.txt";
pub const ANSWER_TEMPLATE: &str = "answer_grounded.txt";

const DEFAULT_CLASSIFY: &str = r#"You classify questions a small-business owner asks about their own records.

Reply with a single JSON object and nothing else:
{"intent": "<intent>", "entities": {"productName": "...", "customerName": "...", "category": "...", "timePeriod": "...", "criteria": "..."}}

intent is one of: get_sales_summary, get_expense_summary, find_product, get_customer_info, general_question.
Omit entities that the question does not mention.

Question: {{query}}"#;

const DEFAULT_ANSWER: &str = r#"You are a sales assistant for a small business. Answer the owner's question using only the business data below. If the data does not contain the answer, say that you do not have enough information.

Business data:
{{context}}

Question: {{query}}"#;

/// Fluent builder over a prompts directory.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    body: String,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self { prompts_dir: prompts_dir.into(), body: String::new(), vars: HashMap::new() }
    }

    /// Use `filename` from the prompts directory as the template body, or
    /// `fallback` when the file is missing or blank.
    pub fn template(mut self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        self.body = match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(_) => {
                tracing::debug!("prompt: template '{}' not found — using built-in default", path.display());
                fallback.trim().to_string()
            }
        };
        self
    }

    /// Register a single `{{key}}` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> String {
        substitute(&self.body, &self.vars)
    }
}

fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = &after[..close];
                match vars.get(key.trim()) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Prompt asking the model to classify `query` into an intent + entities.
pub fn classification_prompt(prompts_dir: &Path, query: &str) -> String {
    PromptBuilder::new(prompts_dir)
        .template(CLASSIFY_TEMPLATE, DEFAULT_CLASSIFY)
        .var("query", query)
        .build()
}

/// Prompt asking for an answer grounded in `context`.
pub fn answer_prompt(prompts_dir: &Path, query: &str, context: &str) -> String {
    PromptBuilder::new(prompts_dir)
        .template(ANSWER_TEMPLATE, DEFAULT_ANSWER)
        .var("query", query)
        .var("context", context)
        .build()
}
