// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Tracing setup and helpers that keep log fields short and free of secrets.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// First `max_chars` characters of `text`, with "..." appended when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Redact a credential for logging.
/// Shows the first four characters of long secrets: "AIza***"
pub fn redact_secret(secret: &str) -> String {
    if secret.chars().count() < 8 {
        return "***".to_string();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{}***", head)
}
