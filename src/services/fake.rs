// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! In-memory engine and LLM doubles for unit tests.

use crate::models::crawler::RunConfig;
use crate::services::engine::{CrawlEngine, EngineError, FetchedPage};
use crate::services::llm::{LlmError, LlmProvider};
use crate::services::markdown::PageLinks;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

enum FakeResponse {
    Page {
        /// Set when the page is served from another URL after redirects
        final_url: Option<String>,
        markdown: String,
        internal_links: Vec<String>,
        delay: Duration,
    },
    Error(String),
}

/// Engine serving canned pages keyed by URL. Unknown URLs fail with HTTP 404.
#[derive(Default)]
pub struct FakeEngine {
    responses: HashMap<String, FakeResponse>,
    fetched: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, markdown: &str) -> Self {
        self.with_linked_page(url, markdown, &[])
    }

    pub fn with_linked_page(mut self, url: &str, markdown: &str, links: &[&str]) -> Self {
        self.responses.insert(
            url.to_string(),
            FakeResponse::Page {
                final_url: None,
                markdown: markdown.to_string(),
                internal_links: links.iter().map(|l| l.to_string()).collect(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// `url` redirects to `final_url`, which serves `markdown` with `links`
    pub fn with_redirect(mut self, url: &str, final_url: &str, markdown: &str, links: &[&str]) -> Self {
        self.responses.insert(
            url.to_string(),
            FakeResponse::Page {
                final_url: Some(final_url.to_string()),
                markdown: markdown.to_string(),
                internal_links: links.iter().map(|l| l.to_string()).collect(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn with_slow_page(mut self, url: &str, markdown: &str, delay: Duration) -> Self {
        self.responses.insert(
            url.to_string(),
            FakeResponse::Page {
                final_url: None,
                markdown: markdown.to_string(),
                internal_links: Vec::new(),
                delay,
            },
        );
        self
    }

    pub fn with_error(mut self, url: &str, message: &str) -> Self {
        self.responses
            .insert(url.to_string(), FakeResponse::Error(message.to_string()));
        self
    }

    /// URLs passed to `fetch`, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlEngine for FakeEngine {
    async fn fetch(&self, url: &str, _config: &RunConfig) -> Result<FetchedPage, EngineError> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }

        match self.responses.get(url) {
            Some(FakeResponse::Page {
                final_url,
                markdown,
                internal_links,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(FetchedPage {
                    url: final_url.clone().unwrap_or_else(|| url.to_string()),
                    status_code: 200,
                    title: None,
                    markdown: markdown.clone(),
                    links: PageLinks {
                        internal: internal_links.clone(),
                        external: Vec::new(),
                    },
                    images_removed: 0,
                    links_removed: 0,
                })
            }
            Some(FakeResponse::Error(message)) => Err(EngineError::Unsupported(message.clone())),
            None => Err(EngineError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// LLM double that returns a fixed reply (or fails) and records prompts
pub struct FakeLlm {
    reply: Option<String>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().ok_or(LlmError::EmptyResponse)
    }
}
