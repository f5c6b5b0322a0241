// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CRAWL_SUCCESSFUL: &str = "Crawling successful";
pub const CRAWL_FAILED: &str = "Crawling failed";
pub const CRAWL_URLS_FAILED: &str = "Crawling specific URLs failed";
pub const CRAWL_SITE_FAILED: &str = "Crawling whole documentation failed";
pub const CRAWLER_NOT_INITIALIZED: &str = "Crawler not initialized";
pub const INVALID_REQUEST: &str = "Invalid request";

/// Behaviour flags applied to every page fetch.
///
/// The service runs with a single fixed value ([`RunConfig::FIXED`]); the flags are
/// not exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub exclude_external_links: bool,
    pub exclude_internal_links: bool,
    /// Ask intermediaries not to serve a cached copy of the page
    pub bypass_cache: bool,
    pub check_robots_txt: bool,
    pub exclude_all_images: bool,
    pub exclude_social_media_links: bool,
}

impl RunConfig {
    pub const FIXED: RunConfig = RunConfig {
        exclude_external_links: true,
        exclude_internal_links: true,
        bypass_cache: true,
        check_robots_txt: true,
        exclude_all_images: true,
        exclude_social_media_links: true,
    };
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::FIXED
    }
}

/// A crawl as requested through the HTTP boundary, after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlRequest {
    SingleUrl {
        url: String,
        clean_output: bool,
    },
    UrlList {
        urls: Vec<String>,
        clean_output: bool,
    },
    SiteCrawl {
        url: String,
        max_pages: usize,
        clean_output: bool,
    },
}

impl CrawlRequest {
    pub fn clean_output(&self) -> bool {
        match self {
            CrawlRequest::SingleUrl { clean_output, .. }
            | CrawlRequest::UrlList { clean_output, .. }
            | CrawlRequest::SiteCrawl { clean_output, .. } => *clean_output,
        }
    }
}

/// Outcome of crawling one page as part of a multi-page crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageResult {
    /// The URL that was requested
    pub url: String,
    pub success: bool,
    /// Page title from `<title>` or the first `<h1>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    pub fn fetched(url: impl Into<String>, title: Option<String>, markdown: String) -> Self {
        Self {
            url: url.into(),
            success: true,
            title,
            original_markdown: Some(markdown),
            cleaned_markdown: None,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            title: None,
            original_markdown: None,
            cleaned_markdown: None,
            error: Some(error.into()),
        }
    }
}

/// Result body returned by every crawl endpoint.
///
/// Failures are reported through `success: false` rather than the HTTP status, so
/// callers must inspect `success`. Absent fields are omitted from the JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CrawlResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_markdown: Option<String>,
    /// Present only when cleaning was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_markdown: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-page outcomes for multi-page crawls, in request or discovery order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageResult>>,
}

impl CrawlResult {
    pub fn not_initialized() -> Self {
        Self {
            success: false,
            message: CRAWLER_NOT_INITIALIZED.to_string(),
            ..Self::default()
        }
    }

    pub fn failure(message: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn single(original_markdown: String, cleaned_markdown: Option<String>) -> Self {
        Self {
            success: true,
            original_markdown: Some(original_markdown),
            cleaned_markdown,
            message: CRAWL_SUCCESSFUL.to_string(),
            ..Self::default()
        }
    }

    /// Build an aggregate result from per-page outcomes.
    ///
    /// Successful pages are joined into one document in page order. Cleaned sections
    /// are only assembled when `clean_output` was requested.
    pub fn from_pages(pages: Vec<PageResult>, clean_output: bool, message: String) -> Self {
        let original = join_sections(&pages, |page| page.original_markdown.as_deref());
        let cleaned = clean_output.then(|| {
            join_sections(&pages, |page| {
                page.cleaned_markdown
                    .as_deref()
                    .or(page.original_markdown.as_deref())
            })
        });

        Self {
            success: true,
            original_markdown: Some(original),
            cleaned_markdown: cleaned,
            message,
            error: None,
            pages: Some(pages),
        }
    }

    pub fn succeeded_pages(&self) -> usize {
        self.pages
            .as_ref()
            .map_or(0, |pages| pages.iter().filter(|p| p.success).count())
    }
}

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn join_sections<'a, F>(pages: &'a [PageResult], body: F) -> String
where
    F: Fn(&'a PageResult) -> Option<&'a str>,
{
    pages
        .iter()
        .filter(|page| page.success)
        .filter_map(|page| body(page).map(|text| format!("<!-- source: {} -->\n\n{}", page.url, text)))
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}
