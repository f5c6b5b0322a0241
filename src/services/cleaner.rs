// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Best-effort LLM cleanup of crawled markdown.
//!
//! Cleaning never fails a crawl: without a provider, or when the provider errors or
//! times out, the original markdown is returned unchanged.

use crate::services::llm::{LlmError, LlmProvider};
use std::sync::Arc;
use std::time::Duration;

const FENCE_OPEN_NEWLINE: &str = "```markdown\n";
const FENCE_OPEN: &str = "```markdown";
const FENCE_CLOSE_NEWLINE: &str = "\n```";
const FENCE_CLOSE: &str = "```";

const CLEAN_INSTRUCTIONS: &str = "You are an expert text cleaner. Given the following markdown content \
from a crawled webpage, remove all irrelevant information such as license details, footers, \
navigation bars, sponsor messages and any other non-essential content. Focus on preserving the \
main programming documentation. Return only the cleaned markdown. Here is the markdown:";

/// The cleanup prompt with the markdown embedded verbatim
pub fn build_clean_prompt(markdown: &str) -> String {
    format!("{CLEAN_INSTRUCTIONS}\n{markdown}")
}

/// Remove a ```` ```markdown ```` fence the model may wrap its answer in.
///
/// The newline-inclusive forms are checked first on both ends.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix(FENCE_OPEN_NEWLINE)
        .or_else(|| text.strip_prefix(FENCE_OPEN))
        .unwrap_or(text);
    text.strip_suffix(FENCE_CLOSE_NEWLINE)
        .or_else(|| text.strip_suffix(FENCE_CLOSE))
        .unwrap_or(text)
}

#[derive(Clone)]
pub struct OutputCleaner {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl OutputCleaner {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// A cleaner that always returns its input
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn clean(&self, markdown: &str) -> String {
        let Some(provider) = &self.provider else {
            return markdown.to_string();
        };

        let prompt = build_clean_prompt(markdown);
        let outcome = match tokio::time::timeout(self.timeout, provider.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(text) => strip_code_fence(&text).to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "LLM cleaning failed, returning original markdown");
                markdown.to_string()
            }
        }
    }
}

impl std::fmt::Debug for OutputCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputCleaner")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish()
    }
}
