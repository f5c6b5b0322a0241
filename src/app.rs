// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, route handlers, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::api::{SingleUrlQuery, UrlsRequest, WholeDocumentationQuery};
use crate::models::crawler::{CrawlRequest, CrawlResult, PageResult, INVALID_REQUEST};
use crate::models::version::VersionResponse;
use crate::services::orchestrator::CrawlOrchestrator;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `CRAWL_AGENT_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("CRAWL_AGENT_VERSION");

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CrawlOrchestrator>,
}

/// A rejected request. Answered with the same JSON shape as a failed crawl so
/// callers can always read `success`, `message` and `error`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = CrawlResult::failure(INVALID_REQUEST, self.error);
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            error: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            error: rejection.body_text(),
        }
    }
}

type HandlerResult<T> = Result<Json<T>, ApiError>;

fn validate_url(raw: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::bad_request(format!("Invalid URL '{raw}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ApiError::bad_request(format!(
            "Invalid URL '{raw}': unsupported scheme '{scheme}'"
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Service name and version", body = VersionResponse))
)]
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        agent: "crawl-agent".to_string(),
        version: VERSION.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health_handler() -> &'static str {
    "healthy"
}

/// Crawl one page and return it as markdown.
#[utoipa::path(
    get,
    path = "/crawl-single-url",
    params(SingleUrlQuery),
    responses(
        (status = 200, description = "Crawl outcome; check `success`", body = CrawlResult),
        (status = 400, description = "Malformed URL", body = CrawlResult)
    )
)]
pub async fn crawl_single_url_handler(
    State(state): State<AppState>,
    query: Result<Query<SingleUrlQuery>, QueryRejection>,
) -> HandlerResult<CrawlResult> {
    let Query(query) = query?;
    validate_url(&query.url)?;

    let result = state
        .orchestrator
        .execute(CrawlRequest::SingleUrl {
            url: query.url,
            clean_output: query.clean_output,
        })
        .await;
    Ok(Json(result))
}

/// Crawl a list of pages and return them in request order.
#[utoipa::path(
    post,
    path = "/crawl-specific-urls",
    request_body = UrlsRequest,
    responses(
        (status = 200, description = "Aggregated crawl outcome; check `success`", body = CrawlResult),
        (status = 400, description = "Empty list or malformed URL", body = CrawlResult)
    )
)]
pub async fn crawl_specific_urls_handler(
    State(state): State<AppState>,
    payload: Result<Json<UrlsRequest>, JsonRejection>,
) -> HandlerResult<CrawlResult> {
    let Json(payload) = payload?;
    if payload.urls.is_empty() {
        return Err(ApiError::bad_request("urls must contain at least one URL"));
    }
    for url in &payload.urls {
        validate_url(url)?;
    }

    let result = state
        .orchestrator
        .execute(CrawlRequest::UrlList {
            urls: payload.urls,
            clean_output: payload.clean_output,
        })
        .await;
    Ok(Json(result))
}

/// Crawl a documentation site breadth-first from its root page.
#[utoipa::path(
    get,
    path = "/crawl-whole-documentation",
    params(WholeDocumentationQuery),
    responses(
        (status = 200, description = "Aggregated crawl outcome; check `success`", body = CrawlResult),
        (status = 400, description = "Malformed URL or zero page budget", body = CrawlResult)
    )
)]
pub async fn crawl_whole_documentation_handler(
    State(state): State<AppState>,
    query: Result<Query<WholeDocumentationQuery>, QueryRejection>,
) -> HandlerResult<CrawlResult> {
    let Query(query) = query?;
    validate_url(&query.url)?;
    if query.max_pages == 0 {
        return Err(ApiError::bad_request("max_pages must be at least 1"));
    }

    let result = state
        .orchestrator
        .execute(CrawlRequest::SiteCrawl {
            url: query.url,
            max_pages: query.max_pages,
            clean_output: query.clean_output,
        })
        .await;
    Ok(Json(result))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        version_handler,
        health_handler,
        crawl_single_url_handler,
        crawl_specific_urls_handler,
        crawl_whole_documentation_handler
    ),
    components(schemas(CrawlResult, PageResult, UrlsRequest, VersionResponse))
)]
pub struct CrawlApiDoc;

/// Build the Axum application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/version", get(version_handler))
        .route("/health", get(health_handler))
        .route("/crawl-single-url", get(crawl_single_url_handler))
        .route("/crawl-specific-urls", post(crawl_specific_urls_handler))
        .route(
            "/crawl-whole-documentation",
            get(crawl_whole_documentation_handler),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", CrawlApiDoc::openapi()))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}
