//! 集成测试共用的替身：搜索、抓取与补全服务

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use md5::{Digest, Md5};
use serde_json::{Value, json};

use ideascope::cache::{KvCache, MemoryCache};
use ideascope::config::Config;
use ideascope::error::TransportError;
use ideascope::events::RecordingEventSink;
use ideascope::fetcher::DocumentFetcher;
use ideascope::generator::context::PipelineContext;
use ideascope::llm::{CompletionProvider, CompletionRequest};
use ideascope::search::{SearchOptions, SearchProvider};
use ideascope::store::{DocumentStore, MemoryStore};
use ideascope::types::{Document, DocumentMetadata, NormalizedIdea, SearchMetadata, SearchResult};

pub fn note_app_idea() -> NormalizedIdea {
    NormalizedIdea {
        title: "AI note app".to_string(),
        description: Some("Voice-first note taking with automatic summaries".to_string()),
        industry: "Productivity".to_string(),
        target_audience: "Students".to_string(),
        key_features: vec!["voice-to-text".to_string(), "summarization".to_string()],
        problem: Some("Students miss details while taking notes in lectures".to_string()),
        business_model: Some("Freemium subscription".to_string()),
    }
}

/// 每条查询返回固定数量的结果，URL随查询变化
pub struct FakeSearch {
    name: String,
    enabled: bool,
    fail: bool,
    per_query: usize,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn new(name: &str, per_query: usize) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            fail: false,
            per_query,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, 0)
        }
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            enabled: false,
            ..Self::new(name, 0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TransportError::Status {
                status: 503,
                url: format!("https://{}.example/search", self.name),
            });
        }

        Ok((0..self.per_query)
            .map(|i| {
                let domain = format!("{}-source{}.com", self.name, i);
                SearchResult {
                    url: format!("https://{}/{}", domain, slug(query)),
                    title: format!("{} #{}", query, i),
                    snippet: format!("Snippet about {}", query),
                    content: None,
                    metadata: SearchMetadata {
                        domain,
                        source: self.name.clone(),
                        fetched_at: Utc::now(),
                        score: 1.0,
                        published_date: Some(Utc::now() - chrono::Duration::days(10)),
                    },
                }
            })
            .collect())
    }
}

/// 返回与URL相关的正文，`blocked_host` 下的URL按robots拦截处理
#[derive(Default)]
pub struct FakeFetcher {
    blocked_host: Option<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocking(host: &str) -> Self {
        Self {
            blocked_host: Some(host.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Document {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let domain = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        if self
            .blocked_host
            .as_deref()
            .is_some_and(|host| domain == host)
        {
            return Document::blocked(url, &domain);
        }

        let content = format!(
            "This page at {} discusses AI note app market size and competitors. The global note-taking software market reached $8.6 billion in 2023 according to analysts.",
            url
        );
        Document {
            url: url.to_string(),
            title: format!("Page {}", url),
            content_hash: Some(format!("{:x}", Md5::digest(content.as_bytes()))),
            content,
            metadata: DocumentMetadata {
                domain,
                fetched_at: Utc::now(),
                content_type: Some("text/html".to_string()),
                ..Default::default()
            },
        }
    }
}

/// 按请求tag（节点名）返回预设响应，可为每个节点设置延迟
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: HashMap<String, Vec<String>>,
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
    /// 按完成顺序记录的tag
    completed: Mutex<Vec<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedCompletion {
    /// 五个节点都返回合法输出
    pub fn valid() -> Self {
        let mut completion = Self::default();
        completion.respond("market", vec![market_json()]);
        completion.respond("tam_sam", vec![tam_sam_json()]);
        completion.respond("competitor", vec![competitor_json()]);
        completion.respond("feasibility", vec![feasibility_json()]);
        completion.respond("strategy", vec![strategy_json()]);
        completion
    }

    /// 依次返回给定的响应，最后一个会被重复使用
    pub fn respond(&mut self, tag: &str, responses: Vec<Value>) {
        self.responses.insert(
            tag.to_string(),
            responses.into_iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn delay(mut self, tag: &str, delay: Duration) -> Self {
        self.delays.insert(tag.to_string(), delay);
        self
    }

    pub fn fail_transport(mut self, tag: &str) -> Self {
        self.failing.push(tag.to_string());
        self
    }

    pub fn completed_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn calls(&self, tag: &str) -> usize {
        self.calls.lock().unwrap().get(tag).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
        let tag = request.tag.clone();
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(tag.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };

        if let Some(delay) = self.delays.get(&tag) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.lock().unwrap().push(tag.clone());

        if self.failing.contains(&tag) {
            return Err(anyhow!("connection reset while calling {}", tag));
        }

        let scripted = self
            .responses
            .get(&tag)
            .ok_or_else(|| anyhow!("no scripted response for {}", tag))?;
        Ok(scripted[index.min(scripted.len() - 1)].clone())
    }
}

pub fn market_json() -> Value {
    json!({
        "confidence": 72,
        "summary": "Strong demand among students for automated lecture notes.",
        "demandSignals": [
            {"signal": "Growing search interest", "evidence": "Market reached $8.6 billion in 2023", "sourceUrl": "https://primary-source0.com/ai-note-app-market-size"}
        ],
        "trends": ["AI summarization", "Voice interfaces"],
        "targetSegments": [{"name": "University students", "description": "Lecture-heavy programs"}],
        "risks": ["Low willingness to pay"]
    })
}

pub fn tam_sam_json() -> Value {
    json!({
        "confidence": 60,
        "tam": {"valueUsd": 8.6e9, "rationale": "Global note-taking software"},
        "sam": {"valueUsd": 1.2e9, "rationale": "Students in English-speaking markets"},
        "som": {"valueUsd": 3.0e7, "rationale": "2.5% share within three years"},
        "methodology": "Top-down from published market size",
        "assumptions": ["Students pay $5 per month"],
        "cagrPercent": 17.0
    })
}

pub fn competitor_json() -> Value {
    json!({
        "confidence": 70,
        "marketLeaders": [
            {"name": "Notion", "description": "All-in-one workspace", "strengths": ["Brand"], "weaknesses": ["No lecture capture"]},
            {"name": "Evernote", "description": "Classic note app"}
        ],
        "directCompetitors": [{"name": "Otter.ai", "description": "Meeting transcription", "pricing": "$10/month"}],
        "differentiationOpportunities": ["Lecture-specific summaries", "Offline mode", "Student pricing"],
        "competitiveIntensity": "high",
        "barriersToEntry": ["Speech model quality"]
    })
}

pub fn feasibility_json() -> Value {
    let dimension = |score: f64, rationale: &str| json!({"score": score, "rationale": rationale});
    json!({
        "confidence": 65,
        "technical": dimension(8.0, "Speech APIs are mature"),
        "market": dimension(7.0, "Clear demand"),
        "financial": dimension(6.0, "Low price point"),
        "operational": dimension(7.0, "Small team can ship"),
        "regulatory": dimension(8.0, "Recording consent varies by campus"),
        "overallScore": 7.2,
        "risks": ["Incumbents add the feature"],
        "recommendation": "Build a focused MVP for one university."
    })
}

pub fn strategy_json() -> Value {
    json!({
        "confidence": 68,
        "verdict": "go",
        "overallScore": 71,
        "positioning": "Voice-first lecture notes for students",
        "goToMarket": [{"step": "Campus ambassador program", "channel": "Universities", "timeline": "Q1"}],
        "pricingStrategy": "Freemium with a $5 student plan",
        "milestones": [{"name": "Beta", "timeframe": "3 months", "successMetric": "1,000 weekly active students"}],
        "keyRisks": ["Incumbent response"],
        "nextSteps": ["Interview 20 students", "Ship a beta"]
    })
}

/// 一套可检查的替身依赖
pub struct Harness {
    pub primary: Arc<FakeSearch>,
    pub secondary: Arc<FakeSearch>,
    pub fetcher: Arc<FakeFetcher>,
    pub completion: Arc<ScriptedCompletion>,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<MemoryStore>,
    pub events: RecordingEventSink,
}

impl Harness {
    pub fn new(completion: ScriptedCompletion) -> Self {
        Self {
            primary: Arc::new(FakeSearch::new("primary", 3)),
            secondary: Arc::new(FakeSearch::disabled("secondary")),
            fetcher: Arc::new(FakeFetcher::new()),
            completion: Arc::new(completion),
            cache: Arc::new(MemoryCache::new()),
            store: Arc::new(MemoryStore::new()),
            events: RecordingEventSink::new(),
        }
    }

    pub fn with_primary(mut self, primary: FakeSearch) -> Self {
        self.primary = Arc::new(primary);
        self
    }

    pub fn with_secondary(mut self, secondary: FakeSearch) -> Self {
        self.secondary = Arc::new(secondary);
        self
    }

    pub fn with_fetcher(mut self, fetcher: FakeFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn config() -> Config {
        let mut config = Config::default();
        config.analysis.node_timeout_seconds = 5;
        config.research.query_concurrency = 2;
        config
    }

    pub fn context(&self) -> PipelineContext {
        self.context_with(Self::config())
    }

    pub fn context_with(&self, config: Config) -> PipelineContext {
        PipelineContext {
            config,
            completion: self.completion.clone(),
            primary_search: self.primary.clone(),
            secondary_search: self.secondary.clone(),
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone() as Arc<dyn KvCache>,
            store: self.store.clone() as Arc<dyn DocumentStore>,
            events: Arc::new(self.events.clone()),
        }
    }
}
