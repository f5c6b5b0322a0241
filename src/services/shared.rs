// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Process-wide crawl engine handle.
//!
//! One engine is installed at startup and shared by every request handler. Handlers
//! borrow it through [`SharedCrawler::get`]; only [`SharedCrawler::shutdown`] closes it.

use crate::services::engine::CrawlEngine;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct SharedCrawler {
    engine: RwLock<Option<Arc<dyn CrawlEngine>>>,
}

impl SharedCrawler {
    /// An empty handle; crawls report "Crawler not initialized" until
    /// [`initialize`](Self::initialize) runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is already initialized with `engine`
    pub fn with_engine(engine: Arc<dyn CrawlEngine>) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
        }
    }

    /// Install the engine. Returns `false` and keeps the current engine when one is
    /// already installed.
    pub async fn initialize(&self, engine: Arc<dyn CrawlEngine>) -> bool {
        let mut slot = self.engine.write().await;
        if slot.is_some() {
            tracing::warn!("Crawler already initialized, ignoring second engine");
            return false;
        }
        *slot = Some(engine);
        tracing::info!("Crawler initialized");
        true
    }

    pub async fn get(&self) -> Option<Arc<dyn CrawlEngine>> {
        self.engine.read().await.clone()
    }

    /// Take the engine out and close it. Returns `false` when there was nothing to close.
    pub async fn shutdown(&self) -> bool {
        let engine = self.engine.write().await.take();
        match engine {
            Some(engine) => {
                engine.close().await;
                tracing::info!("Crawler shut down");
                true
            }
            None => false,
        }
    }
}
