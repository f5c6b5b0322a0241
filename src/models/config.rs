// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Service configuration, read from command-line flags with environment fallbacks.

use crate::services::engine::EngineConfig;
use crate::services::llm::GeminiProvider;
use crate::services::logging::redact_secret;
use crate::services::orchestrator::OrchestratorConfig;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("crawl-agent/", env!("CRAWL_AGENT_VERSION"));
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone, Parser)]
#[command(name = "crawl-agent", version = env!("CRAWL_AGENT_VERSION"))]
#[command(about = "HTTP service that crawls pages into markdown, with optional LLM cleanup")]
pub struct ServiceConfig {
    /// IP address to bind the HTTP server to
    #[arg(long, env = "CRAWL_AGENT_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "CRAWL_AGENT_PORT", default_value_t = 8000, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// User agent for page and robots.txt fetches
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Gemini API key. Cleaning is disabled when unset or empty.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    /// Upper bound on a single page fetch, in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    /// Upper bound on a single LLM generation call, in seconds
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub llm_timeout_secs: u64,

    /// Pages fetched concurrently within one multi-page crawl
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 4, value_parser = RangedU64ValueParser::<usize>::new().range(1..=64))]
    pub max_concurrency: usize,
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            user_agent: self.user_agent.clone(),
            request_timeout: self.fetch_timeout(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            fetch_timeout: self.fetch_timeout(),
            max_concurrency: self.max_concurrency,
        }
    }

    /// The Gemini provider, or `None` when no usable credential is configured
    pub fn llm_provider(&self) -> Option<GeminiProvider> {
        GeminiProvider::from_credential(self.gemini_api_key.as_deref(), &self.gemini_model)
            .map(|provider| provider.with_base_url(&self.gemini_base_url))
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user_agent", &self.user_agent)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_deref().map(redact_secret),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
