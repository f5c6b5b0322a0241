// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTML to markdown conversion and link handling for fetched pages.

use crate::models::crawler::RunConfig;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]{0,500}\]\((?:[^()]|\([^()]*\))*\)")
        .expect("IMAGE_RE: hardcoded regex is valid")
});

// The optional leading `!` lets us skip images when they are kept.
// Targets may hold one level of balanced parens, e.g. `/wiki/Rust_(language)`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]{0,500})\]\(((?:[^()\s]|\([^()\s]*\))*)(?:\s+"[^"]*")?\)"#)
        .expect("LINK_RE: hardcoded regex is valid")
});

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("BLANK_LINES_RE: hardcoded regex is valid"));

const SOCIAL_MEDIA_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "pinterest.com",
    "tiktok.com",
    "snapchat.com",
    "reddit.com",
    "youtube.com",
];

/// Links found on a page, split by whether they stay on the page's host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub internal: Vec<String>,
    pub external: Vec<String>,
}

/// Markdown produced for a page together with what the filters removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub markdown: String,
    pub images_removed: usize,
    pub links_removed: usize,
}

/// Convert an HTML page to markdown, applying the image and link filters of `config`.
///
/// Excluded links keep their text and lose their target. Links whose text was only
/// an excluded image disappear completely.
pub fn html_to_markdown(html: &str, page_url: &Url, config: &RunConfig) -> Conversion {
    let raw = html2md::parse_html(html);
    filter_markdown(&raw, page_url, config)
}

/// Apply the `RunConfig` image and link filters to already converted markdown
pub fn filter_markdown(markdown: &str, page_url: &Url, config: &RunConfig) -> Conversion {
    let mut images_removed = 0;
    let mut links_removed = 0;

    let without_images = if config.exclude_all_images {
        IMAGE_RE
            .replace_all(markdown, |_: &Captures| {
                images_removed += 1;
                String::new()
            })
            .into_owned()
    } else {
        markdown.to_string()
    };

    let filtered = LINK_RE
        .replace_all(&without_images, |caps: &Captures| {
            let whole = caps[0].to_string();
            if !caps[1].is_empty() {
                return whole;
            }
            if is_link_excluded(&caps[3], page_url, config) {
                links_removed += 1;
                caps[2].trim().to_string()
            } else {
                whole
            }
        })
        .into_owned();

    let markdown = BLANK_LINES_RE
        .replace_all(&filtered, "\n\n")
        .trim()
        .to_string();

    Conversion {
        markdown,
        images_removed,
        links_removed,
    }
}

fn is_link_excluded(href: &str, page_url: &Url, config: &RunConfig) -> bool {
    let Ok(target) = page_url.join(href) else {
        return config.exclude_external_links;
    };

    if config.exclude_social_media_links && is_social_media(&target) {
        return true;
    }

    if is_same_host(&target, page_url) {
        config.exclude_internal_links
    } else {
        config.exclude_external_links
    }
}

/// True when the URL points at a social media site or one of its subdomains
pub fn is_social_media(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    SOCIAL_MEDIA_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

fn is_same_host(a: &Url, b: &Url) -> bool {
    matches!(a.scheme(), "http" | "https")
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
}

/// Extract all http(s) links from HTML content.
/// Resolves relative URLs against `base_url`, drops fragments and keeps the first
/// occurrence of each link in document order.
pub fn extract_links(html: &str, base_url: &Url) -> PageLinks {
    let mut links = PageLinks::default();

    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    let mut seen = HashSet::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);

        let link = resolved.to_string();
        if !seen.insert(link.clone()) {
            continue;
        }
        if is_same_host(&resolved, base_url) {
            links.internal.push(link);
        } else {
            links.external.push(link);
        }
    }

    links
}

/// Page title from `<title>`, falling back to the first `<h1>`
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    })
}
