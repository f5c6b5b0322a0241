// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Text generation providers used to clean crawled markdown.

use crate::services::logging::{preview, redact_secret};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("LLM provider returned no text")]
    EmptyResponse,
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Interface to a hosted LLM that completes a prompt
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Google Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: crate::models::config::DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    /// Build a provider only when the credential is present and non-blank
    pub fn from_credential(api_key: Option<&str>, model: &str) -> Option<Self> {
        let api_key = api_key.map(str::trim).filter(|key| !key.is_empty())?;
        Some(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &redact_secret(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        // The key travels in a header so it never shows up in logged URLs
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body: preview(&body, 200),
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.into_text().ok_or(LlmError::EmptyResponse)?;
        tracing::debug!(model = %self.model, chars = text.len(), "LLM generation finished");
        Ok(text)
    }
}
