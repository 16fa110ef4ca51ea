use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{CacheManager, KvCache, MemoryCache};
use crate::config::{CacheBackend, Config};
use crate::events::{EventSink, TracingEventSink};
use crate::fetcher::{ContentFetcher, DocumentFetcher};
use crate::llm::{CompletionProvider, LLMClient};
use crate::search::{BraveSearchProvider, ExaSearchProvider, SearchProvider};
use crate::store::{DocumentStore, FileStore, MemoryStore};

/// 流水线依赖集合，由调用方显式构造后注入各编排器
#[derive(Clone)]
pub struct PipelineContext {
    /// 配置
    pub config: Config,
    /// 结构化补全服务
    pub completion: Arc<dyn CompletionProvider>,
    /// 主搜索服务，必需
    pub primary_search: Arc<dyn SearchProvider>,
    /// 辅助搜索服务，未启用时返回空结果
    pub secondary_search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    /// 调研与节点结果缓存
    pub cache: Arc<dyn KvCache>,
    /// ResearchPack、JobStatus与最终结果的存储
    pub store: Arc<dyn DocumentStore>,
    /// 生命周期事件出口
    pub events: Arc<dyn EventSink>,
}

impl PipelineContext {
    /// 按配置创建真实的依赖
    pub fn from_config(config: Config) -> Result<Self> {
        let completion = LLMClient::new(config.llm.clone())?;
        let primary_search = ExaSearchProvider::new(&config.search.primary)
            .context("Primary search provider is required")?;
        let secondary_search = BraveSearchProvider::new(&config.search.secondary)?;
        let fetcher = ContentFetcher::new(&config.fetcher)?;

        let cache: Arc<dyn KvCache> = match config.cache.backend {
            CacheBackend::Memory if config.cache.enabled => Arc::new(MemoryCache::new()),
            // 关闭缓存时CacheManager不做任何读写
            _ => Arc::new(CacheManager::new(config.cache.clone())),
        };
        let store: Arc<dyn DocumentStore> = match config.store.backend {
            CacheBackend::File => Arc::new(FileStore::new(config.store.store_dir.clone())),
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
        };

        Ok(Self {
            completion: Arc::new(completion),
            primary_search: Arc::new(primary_search),
            secondary_search: Arc::new(secondary_search),
            fetcher: Arc::new(fetcher),
            cache,
            store,
            events: Arc::new(TracingEventSink),
            config,
        })
    }

    /// 替换事件出口
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}
