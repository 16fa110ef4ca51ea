use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde_json::json;

use super::facts::{derive_assumptions, extract_facts};
use super::queries::{generate_queries, research_hash};
use crate::cache::CacheKeys;
use crate::events::{EventEmitter, EventNames, EventSink};
use crate::generator::context::PipelineContext;
use crate::ranking::{canonicalize_url, deduplicate, rank};
use crate::search::SearchOptions;
use crate::store::{Collections, put_record};
use crate::types::{
    Document, NormalizedIdea, RankedDocument, ResearchMetrics, ResearchPack, SearchResult,
    SourceRef,
};
use crate::utils::text::truncate_chars;
use crate::utils::threads::do_parallel_with_limit;

/// 调研编排器：搜索、抓取、去重排序并产出ResearchPack
pub struct ResearchOrchestrator {
    context: PipelineContext,
}

impl ResearchOrchestrator {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    /// 执行一次调研。主搜索服务失败会中止整个调研，单个URL抓取失败不会。
    pub async fn run(
        &self,
        idea: &NormalizedIdea,
        idea_id: &str,
        events: Arc<dyn EventSink>,
    ) -> Result<ResearchPack> {
        let events = EventEmitter::new(events, idea_id);
        events.emit(EventNames::RESEARCH_STARTED, json!({ "title": idea.title }));
        tracing::info!("🔎 开始调研: {}", idea.title);

        let queries = generate_queries(idea);
        events.emit(
            EventNames::QUERIES_GENERATED,
            json!({ "count": queries.len(), "queries": queries }),
        );

        let hash = research_hash(idea_id, &queries);
        let cache_key = CacheKeys::research(idea_id, &hash);

        if let Some(pack) = self.cached_pack(&cache_key).await {
            events.emit(
                EventNames::RESEARCH_CACHE_HIT,
                json!({ "researchHash": hash, "packId": pack.id }),
            );
            tracing::info!("   ✅ 命中调研缓存 [{}]", hash);
            return Ok(pack);
        }
        events.emit(EventNames::RESEARCH_CACHE_MISS, json!({ "researchHash": hash }));

        let results = self.search_all(&queries, &events).await?;
        let search_result_count = results.len();

        let candidates = self.select_candidates(results);
        let unique_url_count = candidates.len();
        tracing::info!(
            "   🌐 {} 条搜索结果，抓取 {} 个URL",
            search_result_count,
            unique_url_count
        );

        let fetched = self.fetch_all(candidates, &events).await;
        let fetched_count = fetched.len();
        let blocked_count = fetched.iter().filter(|d| d.metadata.blocked).count();
        let error_count = fetched.iter().filter(|d| d.metadata.error).count();

        let usable: Vec<Document> = fetched.into_iter().filter(Document::is_usable).collect();
        let usable_count = usable.len();
        let unique = deduplicate(usable);
        let duplicate_count = usable_count - unique.len();
        events.emit(
            EventNames::DEDUPE_COMPLETED,
            json!({ "input": usable_count, "unique": unique.len(), "duplicates": duplicate_count }),
        );

        let ranked = rank(unique, &queries);
        events.emit(
            EventNames::RANKING_COMPLETED,
            json!({
                "count": ranked.len(),
                "topScore": ranked.first().map(|r| r.rank_score),
            }),
        );

        let metrics = ResearchMetrics {
            query_count: queries.len(),
            search_result_count,
            unique_url_count,
            fetched_count,
            blocked_count,
            error_count,
            duplicate_count,
            document_count: ranked.len(),
            secondary_enabled: self.context.secondary_search.is_enabled(),
        };

        let pack = self.assemble_pack(idea_id, &hash, queries, ranked, metrics);
        events.emit(
            EventNames::PACK_ASSEMBLED,
            json!({
                "packId": pack.id,
                "documents": pack.documents.len(),
                "facts": pack.facts.len(),
            }),
        );

        put_record(
            self.context.store.as_ref(),
            Collections::RESEARCH_PACKS,
            &pack.id,
            &pack,
        )
        .await
        .context("Failed to persist research pack")?;

        let ttl = self.context.config.research.pack_ttl();
        match serde_json::to_value(&pack) {
            Ok(value) => match self.context.cache.set(&cache_key, value, ttl).await {
                Ok(()) => events.emit(
                    EventNames::PACK_CACHED,
                    json!({ "key": cache_key, "ttlSeconds": ttl.as_secs() }),
                ),
                Err(e) => tracing::warn!("⚠️ 调研缓存写入失败 [{}]: {}", cache_key, e),
            },
            Err(e) => tracing::warn!("⚠️ 调研结果序列化失败: {}", e),
        }

        tracing::info!(
            "✓ 调研完成: {} 篇文档，{} 条事实",
            pack.documents.len(),
            pack.facts.len()
        );
        Ok(pack)
    }

    /// 读不出或已过期的缓存按未命中处理
    async fn cached_pack(&self, key: &str) -> Option<ResearchPack> {
        let value = match self.context.cache.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("⚠️ 读取调研缓存失败 [{}]: {}", key, e);
                return None;
            }
        };
        match serde_json::from_value::<ResearchPack>(value) {
            Ok(pack) if !pack.is_expired(Utc::now()) => Some(pack),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("⚠️ 调研缓存内容无法解析 [{}]: {}", key, e);
                None
            }
        }
    }

    /// 每条查询同时调用主、辅搜索服务，查询之间按配置的并发度执行
    async fn search_all(
        &self,
        queries: &[String],
        events: &EventEmitter,
    ) -> Result<Vec<SearchResult>> {
        let concurrency = self.context.config.research.query_concurrency.max(1);

        let per_query: Vec<Vec<SearchResult>> = stream::iter(queries.iter())
            .map(|query| self.search_query(query, events))
            .buffered(concurrency)
            .try_collect()
            .await?;

        Ok(per_query.into_iter().flatten().collect())
    }

    async fn search_query(&self, query: &str, events: &EventEmitter) -> Result<Vec<SearchResult>> {
        let options = SearchOptions::default();
        let primary = &self.context.primary_search;
        let secondary = &self.context.secondary_search;

        let (primary_result, secondary_result) = tokio::join!(
            primary.search(query, &options),
            async {
                if secondary.is_enabled() {
                    secondary.search(query, &options).await
                } else {
                    Ok(Vec::new())
                }
            }
        );

        let mut results = match primary_result {
            Ok(results) => results,
            Err(e) => {
                events.emit(
                    EventNames::SEARCH_FAILED,
                    json!({ "query": query, "provider": primary.name(), "error": e.to_string() }),
                );
                tracing::error!("❌ 主搜索服务失败 [{}]: {}", query, e);
                return Err(e)
                    .with_context(|| format!("Primary search failed for query '{}'", query));
            }
        };
        events.emit(
            EventNames::SEARCH_COMPLETED,
            json!({ "query": query, "provider": primary.name(), "count": results.len() }),
        );

        match secondary_result {
            Ok(extra) => {
                if secondary.is_enabled() {
                    events.emit(
                        EventNames::SEARCH_COMPLETED,
                        json!({ "query": query, "provider": secondary.name(), "count": extra.len() }),
                    );
                }
                results.extend(extra);
            }
            Err(e) => {
                events.emit(
                    EventNames::SEARCH_FAILED,
                    json!({ "query": query, "provider": secondary.name(), "error": e.to_string() }),
                );
                tracing::warn!("⚠️ 辅助搜索服务失败 [{}]: {}", query, e);
            }
        }

        Ok(results)
    }

    /// 按规范化URL去重，保持首次出现顺序并截断到上限
    fn select_candidates(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let max_urls = self.context.config.research.max_urls;
        let mut seen = HashSet::new();

        results
            .into_iter()
            .filter(|result| seen.insert(canonicalize_url(&result.url)))
            .take(max_urls)
            .collect()
    }

    async fn fetch_all(&self, candidates: Vec<SearchResult>, events: &EventEmitter) -> Vec<Document> {
        let fetcher = &self.context.fetcher;
        // 抓取器自身限制并发与速率，这里只做一层宽松的上限
        let limit = candidates.len().max(1);

        let fetches = candidates
            .into_iter()
            .map(|candidate| async move {
                let mut document = fetcher.fetch_and_extract(&candidate.url).await;
                if document.metadata.published_date.is_none() {
                    document.metadata.published_date = candidate.metadata.published_date;
                }
                if document.title.trim().is_empty() {
                    document.title = candidate.title.clone();
                }
                if document.metadata.domain.is_empty() {
                    document.metadata.domain = candidate.metadata.domain.clone();
                }
                events.emit(
                    EventNames::FETCH_COMPLETED,
                    json!({
                        "url": document.url,
                        "blocked": document.metadata.blocked,
                        "error": document.metadata.error,
                        "chars": document.content.chars().count(),
                    }),
                );
                document
            })
            .collect::<Vec<_>>();

        do_parallel_with_limit(fetches, limit).await
    }

    fn assemble_pack(
        &self,
        idea_id: &str,
        hash: &str,
        queries: Vec<String>,
        ranked: Vec<RankedDocument>,
        metrics: ResearchMetrics,
    ) -> ResearchPack {
        let research = &self.context.config.research;
        let now = Utc::now();

        let documents: Vec<RankedDocument> = ranked
            .into_iter()
            .map(|mut ranked| {
                ranked.document.content =
                    truncate_chars(&ranked.document.content, research.pack_document_chars)
                        .to_string();
                ranked
            })
            .collect();

        let sources = documents
            .iter()
            .map(|r| SourceRef {
                url: r.document.url.clone(),
                title: r.document.title.clone(),
                domain: r.document.metadata.domain.clone(),
                fetched_at: r.document.metadata.fetched_at,
            })
            .collect();

        let facts = extract_facts(&documents, research.max_facts);
        let assumptions = derive_assumptions(&metrics);

        ResearchPack {
            id: uuid::Uuid::new_v4().to_string(),
            idea_id: idea_id.to_string(),
            research_hash: hash.to_string(),
            queries,
            sources,
            documents,
            facts,
            metrics,
            assumptions,
            ttl: pack_expiry(now, research.pack_ttl()),
            created_at: now,
        }
    }
}

/// Pack的过期时间，TTL最长一百年
fn pack_expiry(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    let ceiling = chrono::Duration::days(365 * 100);
    let ttl = chrono::Duration::from_std(ttl)
        .unwrap_or(ceiling)
        .min(ceiling);
    now.checked_add_signed(ttl).unwrap_or(now)
}
