// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default page budget for whole-documentation crawls
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Query parameters of `GET /crawl-single-url`
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SingleUrlQuery {
    /// The URL to crawl
    pub url: String,
    /// Send the crawled markdown through the LLM cleaner
    #[serde(default)]
    pub clean_output: bool,
}

/// Body of `POST /crawl-specific-urls`
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UrlsRequest {
    /// URLs to crawl, in the order results should be returned
    pub urls: Vec<String>,
    #[serde(default)]
    pub clean_output: bool,
}

/// Query parameters of `GET /crawl-whole-documentation`
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WholeDocumentationQuery {
    /// Root page of the documentation site
    pub url: String,
    /// Upper bound on pages fetched, root included
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub clean_output: bool,
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}
