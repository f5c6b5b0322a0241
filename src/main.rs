// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::Context;
use clap::Parser;
use crawl_agent::app::{create_router, AppState, VERSION};
use crawl_agent::models::config::ServiceConfig;
use crawl_agent::services::cleaner::OutputCleaner;
use crawl_agent::services::engine::HttpCrawlEngine;
use crawl_agent::services::llm::LlmProvider;
use crawl_agent::services::logging::init_tracing;
use crawl_agent::services::orchestrator::CrawlOrchestrator;
use crawl_agent::services::shared::SharedCrawler;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables take precedence
    dotenvy::dotenv().ok();
    init_tracing("crawl_agent=info,tower_http=info");

    let config = ServiceConfig::parse();
    tracing::debug!(?config, "Loaded configuration");

    let engine = HttpCrawlEngine::connect(config.engine_config())
        .context("Failed to start the crawl engine")?;
    let crawler = Arc::new(SharedCrawler::new());
    crawler.initialize(Arc::new(engine)).await;

    let provider: Option<Arc<dyn LlmProvider>> = match config.llm_provider() {
        Some(provider) => {
            tracing::info!(model = provider.model(), "LLM cleaning enabled");
            Some(Arc::new(provider))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY is not set, clean_output will return markdown unchanged");
            None
        }
    };
    let cleaner = OutputCleaner::new(provider, config.llm_timeout());

    let orchestrator = CrawlOrchestrator::new(crawler.clone(), cleaner, config.orchestrator_config());
    let app = create_router(AppState {
        orchestrator: Arc::new(orchestrator),
    });

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("crawl-agent v{} listening on {}", VERSION, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    crawler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
