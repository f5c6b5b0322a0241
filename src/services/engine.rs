// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! The crawl engine: fetches a page, honours robots.txt and turns the HTML into
//! markdown according to a [`RunConfig`].

use crate::models::crawler::RunConfig;
use crate::services::markdown::{extract_links, extract_title, html_to_markdown, PageLinks};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use texting_robots::Robot;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Crawling disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),
    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Failed to fetch content: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unsupported content: {0}")]
    Unsupported(String),
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("Crawl engine is closed")]
    Closed,
}

/// A fetched page converted to markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub markdown: String,
    /// Every link found on the page, whether or not the markdown kept it
    pub links: PageLinks,
    pub images_removed: usize,
    pub links_removed: usize,
}

/// A crawl engine session.
///
/// Implementations must allow concurrent `fetch` calls on one shared instance.
#[async_trait]
pub trait CrawlEngine: Send + Sync {
    async fn fetch(&self, url: &str, config: &RunConfig) -> Result<FetchedPage, EngineError>;

    /// Release the session. Later fetches fail with [`EngineError::Closed`].
    async fn close(&self);
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
}

/// Crawl engine backed by one pooled HTTP client
pub struct HttpCrawlEngine {
    client: reqwest::Client,
    user_agent: String,
    /// robots.txt bodies keyed by origin; empty means allow everything
    robots_cache: Mutex<HashMap<String, String>>,
    closed: AtomicBool,
}

impl HttpCrawlEngine {
    pub fn connect(config: EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        tracing::info!(user_agent = %config.user_agent, "Crawl engine connected");

        Ok(Self {
            client,
            user_agent: config.user_agent,
            robots_cache: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    async fn allowed_by_robots(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let cached = self
            .robots_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&origin).cloned());

        let robots_txt = match cached {
            Some(body) => body,
            None => {
                let body = self.fetch_robots_txt(&origin).await;
                if let Ok(mut cache) = self.robots_cache.lock() {
                    cache.insert(origin, body.clone());
                }
                body
            }
        };

        match Robot::new(&self.user_agent, robots_txt.as_bytes()) {
            Ok(robot) => robot.allowed(url.as_str()),
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable robots.txt, allowing crawl");
                true
            }
        }
    }

    async fn fetch_robots_txt(&self, origin: &str) -> String {
        let robots_url = format!("{}/robots.txt", origin);
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            // If robots.txt doesn't exist or can't be fetched, assume allowed
            Ok(_) | Err(_) => String::new(),
        }
    }
}

fn parse_crawlable_url(url: &str) -> Result<Url, EngineError> {
    let parsed = Url::parse(url).map_err(|e| EngineError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EngineError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(parsed)
}

enum BodyKind {
    Html,
    Text,
}

fn classify_content_type(content_type: &str) -> Option<BodyKind> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "" | "text/html" | "application/xhtml+xml" => Some(BodyKind::Html),
        m if m.starts_with("text/") => Some(BodyKind::Text),
        _ => None,
    }
}

#[async_trait]
impl CrawlEngine for HttpCrawlEngine {
    async fn fetch(&self, url: &str, config: &RunConfig) -> Result<FetchedPage, EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }

        let parsed = parse_crawlable_url(url)?;

        if config.check_robots_txt && !self.allowed_by_robots(&parsed).await {
            tracing::info!(url, "Skipping URL disallowed by robots.txt");
            return Err(EngineError::RobotsDisallowed(url.to_string()));
        }

        let mut request = self.client.get(parsed.as_str());
        if config.bypass_cache {
            request = request
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let kind = classify_content_type(&content_type)
            .ok_or_else(|| EngineError::Unsupported(content_type.clone()))?;

        let body = response.text().await?;

        let page = match kind {
            BodyKind::Html => {
                let conversion = html_to_markdown(&body, &final_url, config);
                FetchedPage {
                    url: final_url.to_string(),
                    status_code: status.as_u16(),
                    title: extract_title(&body),
                    markdown: conversion.markdown,
                    links: extract_links(&body, &final_url),
                    images_removed: conversion.images_removed,
                    links_removed: conversion.links_removed,
                }
            }
            BodyKind::Text => FetchedPage {
                url: final_url.to_string(),
                status_code: status.as_u16(),
                title: None,
                markdown: body,
                links: PageLinks::default(),
                images_removed: 0,
                links_removed: 0,
            },
        };

        tracing::debug!(
            url,
            final_url = %page.url,
            status = page.status_code,
            chars = page.markdown.len(),
            images_removed = page.images_removed,
            links_removed = page.links_removed,
            duration_ms = %started.elapsed().as_millis(),
            "Fetched page"
        );

        Ok(page)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut cache) = self.robots_cache.lock() {
            cache.clear();
        }
        tracing::info!("Crawl engine closed");
    }
}
