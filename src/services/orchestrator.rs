// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Crawl orchestration: single pages, URL lists and bounded site traversal.
//!
//! Every operation returns a [`CrawlResult`]; engine failures are folded into
//! `success: false` results and never propagate to the caller.

use crate::models::crawler::{
    CrawlRequest, CrawlResult, PageResult, RunConfig, CRAWL_FAILED, CRAWL_SITE_FAILED,
    CRAWL_SUCCESSFUL, CRAWL_URLS_FAILED,
};
use crate::services::cleaner::OutputCleaner;
use crate::services::engine::{CrawlEngine, EngineError, FetchedPage};
use crate::services::shared::SharedCrawler;
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single page fetch
    pub fetch_timeout: Duration,
    /// Pages fetched at once by crawl-many and each site level
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_concurrency: 4,
        }
    }
}

pub struct CrawlOrchestrator {
    crawler: Arc<SharedCrawler>,
    cleaner: OutputCleaner,
    run_config: RunConfig,
    fetch_timeout: Duration,
    max_concurrency: usize,
}

impl CrawlOrchestrator {
    pub fn new(crawler: Arc<SharedCrawler>, cleaner: OutputCleaner, config: OrchestratorConfig) -> Self {
        Self {
            crawler,
            cleaner,
            run_config: RunConfig::FIXED,
            fetch_timeout: config.fetch_timeout,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub async fn execute(&self, request: CrawlRequest) -> CrawlResult {
        if request.clean_output() && !self.cleaner.is_enabled() {
            tracing::debug!("Cleaning requested without an LLM provider, output stays unchanged");
        }
        match request {
            CrawlRequest::SingleUrl { url, clean_output } => self.crawl_one(&url, clean_output).await,
            CrawlRequest::UrlList { urls, clean_output } => self.crawl_many(&urls, clean_output).await,
            CrawlRequest::SiteCrawl {
                url,
                max_pages,
                clean_output,
            } => self.crawl_site(&url, max_pages, clean_output).await,
        }
    }

    pub async fn crawl_one(&self, url: &str, clean_output: bool) -> CrawlResult {
        let Some(engine) = self.crawler.get().await else {
            return CrawlResult::not_initialized();
        };

        tracing::info!(url, clean_output, "Crawling single URL");

        match self.fetch_page(engine.as_ref(), url).await {
            Ok(page) => {
                let cleaned = if clean_output {
                    Some(self.cleaner.clean(&page.markdown).await)
                } else {
                    None
                };
                CrawlResult::single(page.markdown, cleaned)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Crawl failed");
                CrawlResult::failure(CRAWL_FAILED, e.to_string())
            }
        }
    }

    pub async fn crawl_many(&self, urls: &[String], clean_output: bool) -> CrawlResult {
        let Some(engine) = self.crawler.get().await else {
            return CrawlResult::not_initialized();
        };
        if urls.is_empty() {
            return CrawlResult::failure(CRAWL_URLS_FAILED, "No URLs provided");
        }

        tracing::info!(count = urls.len(), clean_output, "Crawling URL list");

        let pages: Vec<PageResult> = stream::iter(urls.iter().cloned())
            .map(|url| self.crawl_page(engine.as_ref(), url, clean_output))
            .buffered(self.max_concurrency)
            .map(|page| page.result)
            .collect()
            .await;

        let total = pages.len();
        let succeeded = pages.iter().filter(|page| page.success).count();
        if succeeded == 0 {
            let error = pages
                .iter()
                .find_map(|page| page.error.clone())
                .unwrap_or_default();
            return CrawlResult {
                pages: Some(pages),
                ..CrawlResult::failure(CRAWL_URLS_FAILED, error)
            };
        }

        let message = if succeeded == total {
            CRAWL_SUCCESSFUL.to_string()
        } else {
            format!("Crawled {succeeded} of {total} URLs")
        };
        CrawlResult::from_pages(pages, clean_output, message)
    }

    /// Breadth-first crawl from `url`, staying under the root's directory on the same
    /// origin. At most `max_pages` fetches are made, failed ones included.
    pub async fn crawl_site(&self, url: &str, max_pages: usize, clean_output: bool) -> CrawlResult {
        let Some(engine) = self.crawler.get().await else {
            return CrawlResult::not_initialized();
        };

        let mut scope = match SiteScope::new(url) {
            Ok(scope) => scope,
            Err(e) => return CrawlResult::failure(CRAWL_SITE_FAILED, e.to_string()),
        };
        if max_pages == 0 {
            return CrawlResult::failure(CRAWL_SITE_FAILED, "max_pages must be at least 1");
        }

        tracing::info!(url = %scope.root, max_pages, clean_output, "Crawling documentation site");

        let mut visited = HashSet::from([scope.root.clone()]);
        let mut frontier = vec![scope.root.clone()];
        let mut pages: Vec<PageResult> = Vec::new();
        let mut started = 0;
        let mut depth = 0;

        while !frontier.is_empty() && started < max_pages {
            frontier.truncate(max_pages - started);
            started += frontier.len();

            let level: Vec<CrawledPage> = stream::iter(frontier)
                .map(|page_url| self.crawl_page(engine.as_ref(), page_url, clean_output))
                .buffered(self.max_concurrency)
                .collect()
                .await;

            let mut next = Vec::new();
            for CrawledPage {
                result: page,
                final_url,
                links,
            } in level
            {
                if depth == 0 {
                    if !page.success {
                        let error = page.error.unwrap_or_default();
                        return CrawlResult::failure(CRAWL_SITE_FAILED, error);
                    }
                    // Links resolve against the page the root redirected to
                    if let Some(final_url) = final_url.filter(|u| *u != scope.root) {
                        match SiteScope::new(&final_url) {
                            Ok(redirected) => {
                                tracing::info!(from = %scope.root, to = %redirected.root, "Root redirected, following its scope");
                                visited.insert(redirected.root.clone());
                                scope = redirected;
                            }
                            Err(e) => tracing::warn!(error = %e, "Ignoring unparseable redirect target"),
                        }
                    }
                }
                for link in links {
                    if let Some(candidate) = scope.admit(&link) {
                        if visited.insert(candidate.clone()) {
                            next.push(candidate);
                        }
                    }
                }
                pages.push(page);
            }

            tracing::debug!(depth, fetched = started, queued = next.len(), "Site crawl level finished");
            frontier = next;
            depth += 1;
        }

        let mut result = CrawlResult::from_pages(pages, clean_output, String::new());
        result.message = format!("Crawled {} pages", result.succeeded_pages());
        result
    }

    async fn fetch_page(&self, engine: &dyn CrawlEngine, url: &str) -> Result<FetchedPage, EngineError> {
        tokio::time::timeout(self.fetch_timeout, engine.fetch(url, &self.run_config))
            .await
            .unwrap_or_else(|_| Err(EngineError::Timeout(self.fetch_timeout)))
    }

    /// Fetch and optionally clean one page of a multi-page crawl
    async fn crawl_page(&self, engine: &dyn CrawlEngine, url: String, clean_output: bool) -> CrawledPage {
        match self.fetch_page(engine, &url).await {
            Ok(page) => {
                let cleaned = if clean_output {
                    Some(self.cleaner.clean(&page.markdown).await)
                } else {
                    None
                };
                let mut result = PageResult::fetched(url, page.title, page.markdown);
                result.cleaned_markdown = cleaned;
                CrawledPage {
                    result,
                    final_url: Some(page.url),
                    links: page.links.internal,
                }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Page crawl failed");
                CrawledPage {
                    result: PageResult::failed(url, e.to_string()),
                    final_url: None,
                    links: Vec::new(),
                }
            }
        }
    }
}

/// A page of a multi-page crawl plus what traversal needs from it
struct CrawledPage {
    result: PageResult,
    /// Where the page was served from after redirects
    final_url: Option<String>,
    links: Vec<String>,
}

/// The part of a site a documentation crawl may visit
struct SiteScope {
    /// Root URL with any fragment removed
    root: String,
    origin: url::Origin,
    path_prefix: String,
}

impl SiteScope {
    fn new(url: &str) -> Result<Self, EngineError> {
        let mut root = Url::parse(url).map_err(|e| EngineError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        root.set_fragment(None);

        let path = root.path();
        let path_prefix = match path.rfind('/') {
            Some(idx) => path[..=idx].to_string(),
            None => "/".to_string(),
        };

        Ok(Self {
            origin: root.origin(),
            path_prefix,
            root: root.to_string(),
        })
    }

    /// Normalized form of `link` when it falls inside the scope
    fn admit(&self, link: &str) -> Option<String> {
        let mut candidate = Url::parse(link).ok()?;
        candidate.set_fragment(None);

        if candidate.origin() != self.origin || !candidate.path().starts_with(&self.path_prefix) {
            return None;
        }
        Some(candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crawler::CRAWLER_NOT_INITIALIZED;
    use crate::services::fake::{FakeEngine, FakeLlm};

    fn orchestrator(engine: FakeEngine) -> (CrawlOrchestrator, Arc<FakeEngine>) {
        let engine = Arc::new(engine);
        let crawler = Arc::new(SharedCrawler::with_engine(engine.clone()));
        let orchestrator = CrawlOrchestrator::new(
            crawler,
            OutputCleaner::disabled(),
            OrchestratorConfig::default(),
        );
        (orchestrator, engine)
    }

    fn cleaning_orchestrator(engine: FakeEngine, llm: Arc<FakeLlm>) -> CrawlOrchestrator {
        let crawler = Arc::new(SharedCrawler::with_engine(Arc::new(engine)));
        CrawlOrchestrator::new(
            crawler,
            OutputCleaner::new(Some(llm), Duration::from_secs(5)),
            OrchestratorConfig::default(),
        )
    }

    fn page_urls(result: &CrawlResult) -> Vec<&str> {
        result
            .pages
            .as_ref()
            .map(|pages| pages.iter().map(|page| page.url.as_str()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_uninitialized_crawler_reports_not_initialized() {
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(SharedCrawler::new()),
            OutputCleaner::disabled(),
            OrchestratorConfig::default(),
        );

        for result in [
            orchestrator.crawl_one("https://docs.test/", false).await,
            orchestrator
                .crawl_many(&["https://docs.test/".to_string()], false)
                .await,
            orchestrator.crawl_site("https://docs.test/", 5, false).await,
        ] {
            assert!(!result.success);
            assert_eq!(result.message, CRAWLER_NOT_INITIALIZED);
            assert!(result.original_markdown.is_none());
        }
    }

    #[tokio::test]
    async fn test_crawl_one_returns_markdown_without_cleaning() {
        let (orchestrator, engine) =
            orchestrator(FakeEngine::new().with_page("https://docs.test/", "# Title\ntext"));

        let result = orchestrator.crawl_one("https://docs.test/", false).await;

        assert!(result.success);
        assert_eq!(result.original_markdown.as_deref(), Some("# Title\ntext"));
        assert!(result.cleaned_markdown.is_none());
        assert_eq!(result.message, "Crawling successful");
        assert!(result.error.is_none());
        assert_eq!(engine.fetched(), vec!["https://docs.test/"]);
    }

    #[tokio::test]
    async fn test_crawl_one_cleans_and_strips_fence() {
        let llm = Arc::new(FakeLlm::replying("```markdown\nCleaned\n```"));
        let orchestrator = cleaning_orchestrator(
            FakeEngine::new().with_page("https://docs.test/", "# Title\ntext"),
            llm.clone(),
        );

        let result = orchestrator.crawl_one("https://docs.test/", true).await;

        assert!(result.success);
        assert_eq!(result.original_markdown.as_deref(), Some("# Title\ntext"));
        assert_eq!(result.cleaned_markdown.as_deref(), Some("Cleaned"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_crawl_one_without_credential_returns_original_as_cleaned() {
        let (orchestrator, _) =
            orchestrator(FakeEngine::new().with_page("https://docs.test/", "# Title\ntext"));

        let result = orchestrator.crawl_one("https://docs.test/", true).await;

        assert_eq!(result.cleaned_markdown.as_deref(), Some("# Title\ntext"));
    }

    #[tokio::test]
    async fn test_crawl_one_failure_has_error_and_no_markdown() {
        let (orchestrator, _) =
            orchestrator(FakeEngine::new().with_error("https://docs.test/", "connection reset"));

        let result = orchestrator.crawl_one("https://docs.test/", true).await;

        assert!(!result.success);
        assert_eq!(result.message, "Crawling failed");
        assert!(result.error.as_deref().unwrap().contains("connection reset"));
        assert!(result.original_markdown.is_none());
        assert!(result.cleaned_markdown.is_none());
    }

    #[tokio::test]
    async fn test_crawl_one_cleaner_failure_keeps_success() {
        let llm = Arc::new(FakeLlm::failing());
        let orchestrator = cleaning_orchestrator(
            FakeEngine::new().with_page("https://docs.test/", "raw"),
            llm,
        );

        let result = orchestrator.crawl_one("https://docs.test/", true).await;

        assert!(result.success);
        assert_eq!(result.cleaned_markdown.as_deref(), Some("raw"));
    }

    #[tokio::test]
    async fn test_crawl_one_times_out_slow_fetch() {
        let engine = Arc::new(FakeEngine::new().with_slow_page(
            "https://docs.test/",
            "late",
            Duration::from_secs(5),
        ));
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(SharedCrawler::with_engine(engine)),
            OutputCleaner::disabled(),
            OrchestratorConfig {
                fetch_timeout: Duration::from_millis(20),
                max_concurrency: 1,
            },
        );

        let result = orchestrator.crawl_one("https://docs.test/", false).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_crawl_many_preserves_input_order() {
        let (orchestrator, _) = orchestrator(
            FakeEngine::new()
                .with_slow_page("https://a.test/", "alpha", Duration::from_millis(50))
                .with_page("https://b.test/", "beta")
                .with_slow_page("https://c.test/", "gamma", Duration::from_millis(10)),
        );
        let urls = vec![
            "https://a.test/".to_string(),
            "https://b.test/".to_string(),
            "https://c.test/".to_string(),
        ];

        let result = orchestrator.crawl_many(&urls, false).await;

        assert!(result.success);
        assert_eq!(result.message, "Crawling successful");
        assert_eq!(
            page_urls(&result),
            vec!["https://a.test/", "https://b.test/", "https://c.test/"]
        );
        let markdown = result.original_markdown.unwrap();
        let alpha = markdown.find("alpha").unwrap();
        let beta = markdown.find("beta").unwrap();
        let gamma = markdown.find("gamma").unwrap();
        assert!(alpha < beta && beta < gamma);
    }

    #[tokio::test]
    async fn test_crawl_many_partial_failure() {
        let (orchestrator, _) = orchestrator(
            FakeEngine::new()
                .with_page("https://a.test/", "alpha")
                .with_error("https://b.test/", "blocked"),
        );
        let urls = vec!["https://a.test/".to_string(), "https://b.test/".to_string()];

        let result = orchestrator.crawl_many(&urls, false).await;

        assert!(result.success);
        assert_eq!(result.message, "Crawled 1 of 2 URLs");
        let pages = result.pages.as_ref().unwrap();
        assert!(pages[0].success);
        assert!(!pages[1].success);
        assert!(pages[1].error.as_deref().unwrap().contains("blocked"));
        assert!(!result.original_markdown.unwrap().contains("b.test"));
    }

    #[tokio::test]
    async fn test_crawl_many_all_failed() {
        let (orchestrator, _) = orchestrator(
            FakeEngine::new()
                .with_error("https://a.test/", "first problem")
                .with_error("https://b.test/", "second problem"),
        );
        let urls = vec!["https://a.test/".to_string(), "https://b.test/".to_string()];

        let result = orchestrator.crawl_many(&urls, false).await;

        assert!(!result.success);
        assert_eq!(result.message, "Crawling specific URLs failed");
        assert!(result.error.as_deref().unwrap().contains("first problem"));
        assert!(result.original_markdown.is_none());
        assert_eq!(result.pages.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_crawl_many_cleans_each_page() {
        let llm = Arc::new(FakeLlm::replying("tidy"));
        let orchestrator = cleaning_orchestrator(
            FakeEngine::new()
                .with_page("https://a.test/", "alpha")
                .with_page("https://b.test/", "beta"),
            llm.clone(),
        );
        let urls = vec!["https://a.test/".to_string(), "https://b.test/".to_string()];

        let result = orchestrator.crawl_many(&urls, true).await;

        assert_eq!(llm.calls(), 2);
        let pages = result.pages.as_ref().unwrap();
        assert!(pages
            .iter()
            .all(|page| page.cleaned_markdown.as_deref() == Some("tidy")));
        assert!(result.cleaned_markdown.unwrap().contains("tidy"));
    }

    fn docs_site() -> FakeEngine {
        FakeEngine::new()
            .with_linked_page(
                "https://docs.test/guide/",
                "root",
                &[
                    "https://docs.test/guide/a",
                    "https://docs.test/guide/b",
                    "https://docs.test/guide/a#install",
                    "https://docs.test/blog/post",
                    "https://other.test/guide/c",
                ],
            )
            .with_linked_page(
                "https://docs.test/guide/a",
                "page a",
                &["https://docs.test/guide/", "https://docs.test/guide/c"],
            )
            .with_page("https://docs.test/guide/b", "page b")
            .with_page("https://docs.test/guide/c", "page c")
    }

    #[tokio::test]
    async fn test_crawl_site_walks_breadth_first_within_scope() {
        let (orchestrator, engine) = orchestrator(docs_site());

        let result = orchestrator
            .crawl_site("https://docs.test/guide/", 20, false)
            .await;

        assert!(result.success);
        assert_eq!(result.message, "Crawled 4 pages");
        assert_eq!(
            page_urls(&result),
            vec![
                "https://docs.test/guide/",
                "https://docs.test/guide/a",
                "https://docs.test/guide/b",
                "https://docs.test/guide/c",
            ]
        );

        let fetched: HashSet<String> = engine.fetched().into_iter().collect();
        assert_eq!(fetched.len(), 4);
        assert!(!fetched.contains("https://docs.test/blog/post"));
        assert!(!fetched.contains("https://other.test/guide/c"));
    }

    #[tokio::test]
    async fn test_crawl_site_respects_max_pages() {
        let (orchestrator, engine) = orchestrator(docs_site());

        let result = orchestrator
            .crawl_site("https://docs.test/guide/", 2, false)
            .await;

        assert!(result.success);
        assert_eq!(
            page_urls(&result),
            vec!["https://docs.test/guide/", "https://docs.test/guide/a"]
        );
        assert_eq!(engine.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_site_single_page_budget_fetches_root_only() {
        let (orchestrator, engine) = orchestrator(docs_site());

        let result = orchestrator
            .crawl_site("https://docs.test/guide/#top", 1, false)
            .await;

        assert_eq!(result.message, "Crawled 1 pages");
        assert_eq!(engine.fetched(), vec!["https://docs.test/guide/"]);
    }

    #[tokio::test]
    async fn test_crawl_site_follows_scope_of_redirected_root() {
        let (orchestrator, engine) = orchestrator(
            FakeEngine::new()
                .with_redirect(
                    "http://docs.test/guide/",
                    "https://www.docs.test/v2/guide/",
                    "root",
                    &[
                        "https://www.docs.test/v2/guide/intro",
                        "https://www.docs.test/v2/guide/",
                        "https://www.docs.test/v2/blog/",
                    ],
                )
                .with_page("https://www.docs.test/v2/guide/intro", "intro"),
        );

        let result = orchestrator
            .crawl_site("http://docs.test/guide/", 10, false)
            .await;

        assert!(result.success);
        assert_eq!(result.message, "Crawled 2 pages");
        assert_eq!(
            page_urls(&result),
            vec!["http://docs.test/guide/", "https://www.docs.test/v2/guide/intro"]
        );
        assert_eq!(engine.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_site_root_failure_fails_whole_crawl() {
        let (orchestrator, _) =
            orchestrator(FakeEngine::new().with_error("https://docs.test/guide/", "robots"));

        let result = orchestrator
            .crawl_site("https://docs.test/guide/", 5, false)
            .await;

        assert!(!result.success);
        assert_eq!(result.message, "Crawling whole documentation failed");
        assert!(result.error.as_deref().unwrap().contains("robots"));
    }

    #[tokio::test]
    async fn test_crawl_site_reports_failed_child_pages() {
        let (orchestrator, _) = orchestrator(FakeEngine::new().with_linked_page(
            "https://docs.test/",
            "root",
            &["https://docs.test/missing"],
        ));

        let result = orchestrator.crawl_site("https://docs.test/", 5, false).await;

        assert!(result.success);
        assert_eq!(result.message, "Crawled 1 pages");
        let pages = result.pages.as_ref().unwrap();
        assert_eq!(pages.len(), 2);
        assert!(!pages[1].success);
        assert!(pages[1].error.as_deref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_crawl_site_rejects_invalid_root() {
        let (orchestrator, engine) = orchestrator(FakeEngine::new());

        let result = orchestrator.crawl_site("not a url", 5, false).await;

        assert!(!result.success);
        assert_eq!(result.message, "Crawling whole documentation failed");
        assert!(engine.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_execute_dispatches_by_request_kind() {
        let (orchestrator, _) =
            orchestrator(FakeEngine::new().with_page("https://docs.test/", "# Title\ntext"));

        let result = orchestrator
            .execute(CrawlRequest::SingleUrl {
                url: "https://docs.test/".to_string(),
                clean_output: false,
            })
            .await;

        assert!(result.success);
        assert!(result.pages.is_none());
    }

    #[test]
    fn test_scope_uses_root_directory_prefix() {
        let scope = SiteScope::new("https://docs.test/guide/intro.html#start").unwrap();

        assert_eq!(scope.root, "https://docs.test/guide/intro.html");
        assert_eq!(
            scope.admit("https://docs.test/guide/setup.html#x").as_deref(),
            Some("https://docs.test/guide/setup.html")
        );
        assert!(scope.admit("https://docs.test/api/").is_none());
        assert!(scope.admit("http://docs.test/guide/setup.html").is_none());
        assert!(scope.admit("https://docs.test:8443/guide/").is_none());
    }
}
